//! File record repository.
//!
//! Not-found is a normal outcome (`Ok(None)` / `Ok(false)`); only store
//! failures and constraint violations come back as errors.

use tracing::{debug, info, warn};

use super::password::hash_password;
use super::record::{FileRecord, FileSummary, NewFileRecord};
use crate::db::DbPool;
use crate::{Result, ShareboxError};

const FILE_COLUMNS: &str = "id, owner_id, external_file_ref, display_name, file_category, \
                            public_uuid, created_at, password_hash, is_protected";

/// Repository for file record operations.
pub struct FileRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FileRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Register a new file.
    ///
    /// A password, when given, is stored only as its digest. Returns
    /// [`ShareboxError::DuplicateUuid`] if the public UUID is taken; the
    /// caller should mint a fresh identifier and retry.
    pub async fn register(&self, new_file: &NewFileRecord) -> Result<FileRecord> {
        let password_hash = new_file
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?;
        let is_protected = password_hash.is_some();

        let sql = format!(
            "INSERT INTO files (owner_id, external_file_ref, display_name, file_category,
                                public_uuid, created_at, password_hash, is_protected)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {FILE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(new_file.owner_id)
            .bind(&new_file.external_file_ref)
            .bind(&new_file.display_name)
            .bind(&new_file.file_category)
            .bind(&new_file.public_uuid)
            .bind(new_file.created_at)
            .bind(&password_hash)
            .bind(is_protected)
            .fetch_one(self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    warn!(
                        public_uuid = %new_file.public_uuid,
                        owner_id = new_file.owner_id,
                        "Public uuid already registered"
                    );
                    ShareboxError::DuplicateUuid(new_file.public_uuid.clone())
                }
                other => {
                    warn!(
                        public_uuid = %new_file.public_uuid,
                        error = %other,
                        "Failed to register file"
                    );
                    ShareboxError::Database(other.to_string())
                }
            })?;

        info!(
            public_uuid = %record.public_uuid,
            owner_id = record.owner_id,
            protected = record.is_protected,
            "Registered file"
        );
        Ok(record)
    }

    /// Replace the password of a file and mark it protected.
    ///
    /// Returns `false` when no file has this public UUID.
    pub async fn set_password(&self, public_uuid: &str, password: &str) -> Result<bool> {
        let password_hash = hash_password(password)?;

        let result = sqlx::query(
            "UPDATE files SET password_hash = $1, is_protected = 1 WHERE public_uuid = $2",
        )
        .bind(&password_hash)
        .bind(public_uuid)
        .execute(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(public_uuid = %public_uuid, "File password updated");
        } else {
            debug!(public_uuid = %public_uuid, "Password update matched no file");
        }
        Ok(updated)
    }

    /// Delete a file owned by `owner_id`.
    ///
    /// Attempt counters for the file are dropped in the same transaction.
    /// Returns `false` if nothing matched, including a file owned by
    /// someone else.
    pub async fn remove(&self, public_uuid: &str, owner_id: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let result = sqlx::query("DELETE FROM files WHERE public_uuid = $1 AND owner_id = $2")
            .bind(public_uuid)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            sqlx::query("DELETE FROM password_attempts WHERE public_uuid = $1")
                .bind(public_uuid)
                .execute(&mut *tx)
                .await
                .map_err(|e| ShareboxError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        info!(
            public_uuid = %public_uuid,
            owner_id = owner_id,
            deleted = deleted,
            "Remove file"
        );
        Ok(deleted)
    }

    /// Look a file up by public UUID, optionally restricted to an owner.
    pub async fn fetch(&self, public_uuid: &str, owner_id: Option<i64>) -> Result<Option<FileRecord>> {
        let record = match owner_id {
            Some(owner_id) => {
                let sql = format!(
                    "SELECT {FILE_COLUMNS} FROM files WHERE public_uuid = $1 AND owner_id = $2"
                );
                sqlx::query_as::<_, FileRecord>(&sql)
                    .bind(public_uuid)
                    .bind(owner_id)
                    .fetch_optional(self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE public_uuid = $1");
                sqlx::query_as::<_, FileRecord>(&sql)
                    .bind(public_uuid)
                    .fetch_optional(self.pool)
                    .await
            }
        }
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        debug!(
            public_uuid = %public_uuid,
            owner_id = ?owner_id,
            found = record.is_some(),
            "Fetch file"
        );
        Ok(record)
    }

    /// List the files registered by a user, in registration order.
    pub async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<FileSummary>> {
        let files = sqlx::query_as::<_, FileSummary>(
            "SELECT public_uuid, display_name, created_at, is_protected
             FROM files WHERE owner_id = $1 ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        debug!(owner_id = owner_id, count = files.len(), "Listed files");
        Ok(files)
    }

    /// Count the files registered by a user.
    pub async fn count_for_owner(&self, owner_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PasswordError;
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn new_file(owner_id: i64, public_uuid: &str) -> NewFileRecord {
        NewFileRecord::new(owner_id, "tg-ref", "notes.txt", "document", public_uuid)
    }

    #[tokio::test]
    async fn test_register_unprotected() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());

        let record = repo.register(&new_file(1, "uuid-open")).await.unwrap();
        assert!(record.id > 0);
        assert_eq!(record.owner_id, 1);
        assert_eq!(record.public_uuid, "uuid-open");
        assert!(!record.is_protected);
        assert!(record.password_hash.is_none());
    }

    #[tokio::test]
    async fn test_register_protected_stores_digest() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());

        let record = repo
            .register(&new_file(1, "uuid-locked").with_password("secret"))
            .await
            .unwrap();
        assert!(record.is_protected);
        let digest = record.password_hash.clone().unwrap();
        assert_ne!(digest, "secret");
        assert_eq!(digest, hash_password("secret").unwrap());
    }

    #[tokio::test]
    async fn test_register_preserves_created_at() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        let created_at = chrono::DateTime::parse_from_rfc3339("2024-03-01T12:30:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);

        repo.register(&new_file(1, "uuid-time").with_created_at(created_at))
            .await
            .unwrap();

        let fetched = repo.fetch("uuid-time", None).await.unwrap().unwrap();
        assert_eq!(fetched.created_at, created_at);
    }

    #[tokio::test]
    async fn test_register_duplicate_uuid() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());

        repo.register(&new_file(1, "dup")).await.unwrap();
        let result = repo.register(&new_file(2, "dup")).await;
        assert!(matches!(result, Err(ShareboxError::DuplicateUuid(ref u)) if u == "dup"));

        // The first registration is untouched
        let record = repo.fetch("dup", None).await.unwrap().unwrap();
        assert_eq!(record.owner_id, 1);
    }

    #[tokio::test]
    async fn test_register_empty_password_rejected() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());

        let result = repo.register(&new_file(1, "uuid-empty").with_password("")).await;
        assert!(matches!(
            result,
            Err(ShareboxError::Password(PasswordError::Empty))
        ));
        assert!(repo.fetch("uuid-empty", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_password() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        repo.register(&new_file(1, "uuid-1")).await.unwrap();

        assert!(repo.set_password("uuid-1", "first").await.unwrap());
        let record = repo.fetch("uuid-1", None).await.unwrap().unwrap();
        assert!(record.is_protected);
        assert!(record.check_password("first"));

        assert!(repo.set_password("uuid-1", "second").await.unwrap());
        let record = repo.fetch("uuid-1", None).await.unwrap().unwrap();
        assert!(record.check_password("second"));
        assert!(!record.check_password("first"));
    }

    #[tokio::test]
    async fn test_set_password_unknown_uuid() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());

        assert!(!repo.set_password("missing", "secret").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_owner_scoped() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        repo.register(&new_file(1, "uuid-1")).await.unwrap();

        assert!(!repo.remove("uuid-1", 2).await.unwrap());
        assert!(repo.fetch("uuid-1", None).await.unwrap().is_some());

        assert!(repo.remove("uuid-1", 1).await.unwrap());
        assert!(repo.fetch("uuid-1", None).await.unwrap().is_none());

        assert!(!repo.remove("uuid-1", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_clears_attempt_counters() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        repo.register(&new_file(1, "uuid-1").with_password("pw"))
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO password_attempts (owner_id, public_uuid, attempts, last_attempt_at)
             VALUES (2, 'uuid-1', 3, '2024-01-01T00:00:00+00:00')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        assert!(repo.remove("uuid-1", 1).await.unwrap());

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM password_attempts WHERE public_uuid = 'uuid-1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_fetch_owner_scoped() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        repo.register(&new_file(1, "uuid-1")).await.unwrap();

        assert!(repo.fetch("uuid-1", Some(1)).await.unwrap().is_some());
        assert!(repo.fetch("uuid-1", Some(2)).await.unwrap().is_none());
        assert!(repo.fetch("uuid-1", None).await.unwrap().is_some());
        assert!(repo.fetch("missing", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_for_owner() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());

        repo.register(&new_file(1, "a")).await.unwrap();
        repo.register(&new_file(2, "b")).await.unwrap();
        repo.register(&new_file(1, "c").with_password("pw"))
            .await
            .unwrap();

        let files = repo.list_for_owner(1).await.unwrap();
        let uuids: Vec<&str> = files.iter().map(|f| f.public_uuid.as_str()).collect();
        assert_eq!(uuids, vec!["a", "c"]);
        assert!(!files[0].is_protected);
        assert!(files[1].is_protected);

        assert_eq!(repo.count_for_owner(1).await.unwrap(), 2);
        assert!(repo.list_for_owner(99).await.unwrap().is_empty());
        assert_eq!(repo.count_for_owner(99).await.unwrap(), 0);
    }
}
