//! Password digests for protected files.
//!
//! Passwords are stored as lowercase hex SHA-256. The plaintext never
//! reaches the database.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LENGTH: usize = 64;

/// Password-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// An empty string cannot protect a file.
    #[error("password must not be empty")]
    Empty,
}

/// Digest a password for storage.
///
/// # Examples
///
/// ```
/// use sharebox::hash_password;
///
/// let digest = hash_password("secret").unwrap();
/// assert_eq!(digest.len(), 64);
/// assert_ne!(digest, "secret");
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }
    Ok(format!("{:x}", Sha256::digest(password.as_bytes())))
}

/// Check a password against a stored digest.
///
/// The comparison touches every byte so timing does not reveal the length
/// of the matching prefix.
pub fn verify_password(password: &str, digest: &str) -> bool {
    let Ok(candidate) = hash_password(password) else {
        return false;
    };
    let stored = digest.to_ascii_lowercase();
    if candidate.len() != stored.len() {
        return false;
    }
    candidate
        .bytes()
        .zip(stored.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
