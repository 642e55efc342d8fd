//! Password attempt guard for sharebox.
//!
//! Counts failed password checks per (user, file) and applies a lockout
//! policy on top of the counts.

mod access;
mod attempts;
mod policy;

pub use access::{AccessGuard, AccessOutcome};
pub use attempts::{AttemptRepository, AttemptState};
pub use policy::{AttemptPolicy, GuardDecision};
