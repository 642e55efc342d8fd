//! File record types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::password::verify_password;

/// Generate a fresh public identifier for a new file record.
pub fn new_public_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// A registered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FileRecord {
    /// Surrogate key assigned by the store.
    pub id: i64,
    /// User who registered the file.
    pub owner_id: i64,
    /// Handle to the file content held by the chat platform.
    pub external_file_ref: String,
    /// Human-readable file name.
    pub display_name: String,
    /// Classification tag (type or extension).
    pub file_category: String,
    /// Shared lookup key.
    pub public_uuid: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the protecting password.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// True iff `password_hash` is set.
    pub is_protected: bool,
}

impl FileRecord {
    /// Check a password against this record. Unprotected records accept anything.
    pub fn check_password(&self, password: &str) -> bool {
        match &self.password_hash {
            Some(digest) => verify_password(password, digest),
            None => true,
        }
    }
}

/// Owner listing entry; never carries the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FileSummary {
    pub public_uuid: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub is_protected: bool,
}

/// Data for registering a new file.
#[derive(Clone)]
pub struct NewFileRecord {
    pub owner_id: i64,
    pub external_file_ref: String,
    pub display_name: String,
    pub file_category: String,
    pub public_uuid: String,
    pub created_at: DateTime<Utc>,
    /// Plaintext password; digested before it is stored.
    pub password: Option<String>,
}

impl NewFileRecord {
    /// Create an unprotected record stamped with the current time.
    pub fn new(
        owner_id: i64,
        external_file_ref: impl Into<String>,
        display_name: impl Into<String>,
        file_category: impl Into<String>,
        public_uuid: impl Into<String>,
    ) -> Self {
        Self {
            owner_id,
            external_file_ref: external_file_ref.into(),
            display_name: display_name.into(),
            file_category: file_category.into(),
            public_uuid: public_uuid.into(),
            created_at: Utc::now(),
            password: None,
        }
    }

    /// Protect the record with a password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Override the registration time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

// Hand-written so the plaintext password never shows up in logs.
impl std::fmt::Debug for NewFileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewFileRecord")
            .field("owner_id", &self.owner_id)
            .field("external_file_ref", &self.external_file_ref)
            .field("display_name", &self.display_name)
            .field("file_category", &self.file_category)
            .field("public_uuid", &self.public_uuid)
            .field("created_at", &self.created_at)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
