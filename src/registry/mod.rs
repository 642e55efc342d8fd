//! File registry for sharebox.
//!
//! Records which chat-platform file a user shared, under which public UUID,
//! and whether a password protects it.

mod password;
mod record;
mod repository;

pub use password::{hash_password, verify_password, PasswordError, DIGEST_HEX_LENGTH};
pub use record::{new_public_uuid, FileRecord, FileSummary, NewFileRecord};
pub use repository::FileRepository;
