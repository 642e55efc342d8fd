//! sharebox - file registry for a chat-bot file-sharing service.
//!
//! Stores which files users shared under which public UUID, keeps password
//! digests for protected files, and counts failed password attempts so the
//! bot can lock out guessing.

pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod logging;
pub mod registry;

pub use config::Config;
pub use db::{Database, DbPool};
pub use error::{Result, ShareboxError};
pub use guard::{
    AccessGuard, AccessOutcome, AttemptPolicy, AttemptRepository, AttemptState, GuardDecision,
};
pub use registry::{
    hash_password, new_public_uuid, verify_password, FileRecord, FileRepository, FileSummary,
    NewFileRecord, PasswordError,
};
