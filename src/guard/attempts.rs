//! Failed password attempt counters.
//!
//! One row per (user, file) that has failed at least once. A missing row
//! reads as zero attempts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::db::DbPool;
use crate::{Result, ShareboxError};

/// Counter state for one (user, file) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AttemptState {
    /// Failed checks since the last reset.
    pub attempts: u32,
    /// Time of the most recent failure.
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl AttemptState {
    /// State of a key with no recorded failures.
    pub const fn empty() -> Self {
        Self {
            attempts: 0,
            last_attempt_at: None,
        }
    }

    /// True if no failure is recorded.
    pub fn is_empty(&self) -> bool {
        self.attempts == 0
    }
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::empty()
    }
}

/// Repository for attempt counters.
pub struct AttemptRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> AttemptRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Record a failed attempt now.
    pub async fn record_failed_attempt(
        &self,
        owner_id: i64,
        public_uuid: &str,
    ) -> Result<AttemptState> {
        self.record_failed_attempt_at(owner_id, public_uuid, Utc::now())
            .await
    }

    /// Record a failed attempt at `at` and return the updated state.
    ///
    /// A single upsert statement: concurrent failures on the same key are
    /// serialized by the store, so none is lost. `last_attempt_at` never
    /// moves backwards.
    pub async fn record_failed_attempt_at(
        &self,
        owner_id: i64,
        public_uuid: &str,
        at: DateTime<Utc>,
    ) -> Result<AttemptState> {
        let state = sqlx::query_as::<_, AttemptState>(
            "INSERT INTO password_attempts (owner_id, public_uuid, attempts, last_attempt_at)
             VALUES ($1, $2, 1, $3)
             ON CONFLICT(owner_id, public_uuid) DO UPDATE SET
                 attempts = attempts + 1,
                 last_attempt_at = MAX(COALESCE(last_attempt_at, excluded.last_attempt_at),
                                       excluded.last_attempt_at)
             RETURNING attempts, last_attempt_at",
        )
        .bind(owner_id)
        .bind(public_uuid)
        .bind(at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        debug!(
            owner_id = owner_id,
            public_uuid = %public_uuid,
            attempts = state.attempts,
            "Recorded failed password attempt"
        );
        Ok(state)
    }

    /// Claim one password check for a key at `at`.
    ///
    /// Counts the check as a failure up front and returns the new state, or
    /// `None` when `max_attempts` are already counted inside the lockout
    /// window. A counter whose last failure is at or before `stale_before`
    /// restarts at 1. One statement, so concurrent callers can never claim
    /// more than `max_attempts` checks per window.
    pub async fn reserve_attempt_at(
        &self,
        owner_id: i64,
        public_uuid: &str,
        max_attempts: u32,
        stale_before: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Option<AttemptState>> {
        let state = sqlx::query_as::<_, AttemptState>(
            "INSERT INTO password_attempts (owner_id, public_uuid, attempts, last_attempt_at)
             VALUES ($1, $2, 1, $3)
             ON CONFLICT(owner_id, public_uuid) DO UPDATE SET
                 attempts = CASE
                     WHEN password_attempts.last_attempt_at <= $4 THEN 1
                     ELSE password_attempts.attempts + 1
                 END,
                 last_attempt_at = CASE
                     WHEN password_attempts.last_attempt_at <= $5 THEN excluded.last_attempt_at
                     ELSE MAX(COALESCE(password_attempts.last_attempt_at, excluded.last_attempt_at),
                              excluded.last_attempt_at)
                 END
             WHERE password_attempts.attempts < $6
                OR password_attempts.last_attempt_at <= $7
             RETURNING attempts, last_attempt_at",
        )
        .bind(owner_id)
        .bind(public_uuid)
        .bind(at)
        .bind(stale_before)
        .bind(stale_before)
        .bind(i64::from(max_attempts))
        .bind(stale_before)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        match state {
            Some(state) => debug!(
                owner_id = owner_id,
                public_uuid = %public_uuid,
                attempts = state.attempts,
                "Reserved password check"
            ),
            None => debug!(
                owner_id = owner_id,
                public_uuid = %public_uuid,
                "No password checks left in window"
            ),
        }
        Ok(state)
    }

    /// Read the counter for a key.
    pub async fn get_attempt_state(&self, owner_id: i64, public_uuid: &str) -> Result<AttemptState> {
        let state = sqlx::query_as::<_, AttemptState>(
            "SELECT attempts, last_attempt_at FROM password_attempts
             WHERE owner_id = $1 AND public_uuid = $2",
        )
        .bind(owner_id)
        .bind(public_uuid)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| ShareboxError::Database(e.to_string()))?;

        Ok(state.unwrap_or_default())
    }

    /// Reset the counter for a key.
    ///
    /// Idempotent. Returns whether a counter existed.
    pub async fn clear_attempts(&self, owner_id: i64, public_uuid: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM password_attempts WHERE owner_id = $1 AND public_uuid = $2")
                .bind(owner_id)
                .bind(public_uuid)
                .execute(self.pool)
                .await
                .map_err(|e| ShareboxError::Database(e.to_string()))?;

        let cleared = result.rows_affected() > 0;
        if cleared {
            debug!(owner_id = owner_id, public_uuid = %public_uuid, "Cleared attempts");
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::Duration;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_counter_reads_empty() {
        let db = setup_db().await;
        let repo = AttemptRepository::new(db.pool());

        let state = repo.get_attempt_state(1, "abc").await.unwrap();
        assert_eq!(state, AttemptState::empty());
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_record_failed_attempt_increments() {
        let db = setup_db().await;
        let repo = AttemptRepository::new(db.pool());

        for expected in 1..=3 {
            let state = repo.record_failed_attempt(1, "abc").await.unwrap();
            assert_eq!(state.attempts, expected);
            assert!(state.last_attempt_at.is_some());
        }

        let state = repo.get_attempt_state(1, "abc").await.unwrap();
        assert_eq!(state.attempts, 3);
    }

    #[tokio::test]
    async fn test_last_attempt_never_moves_backwards() {
        let db = setup_db().await;
        let repo = AttemptRepository::new(db.pool());
        let now = Utc::now();

        let first = repo.record_failed_attempt_at(1, "abc", now).await.unwrap();
        assert_eq!(first.last_attempt_at, Some(now));

        let later = now + Duration::seconds(30);
        let second = repo.record_failed_attempt_at(1, "abc", later).await.unwrap();
        assert_eq!(second.last_attempt_at, Some(later));

        let earlier = now - Duration::seconds(30);
        let third = repo.record_failed_attempt_at(1, "abc", earlier).await.unwrap();
        assert_eq!(third.attempts, 3);
        assert_eq!(third.last_attempt_at, Some(later));
    }

    #[tokio::test]
    async fn test_counters_are_per_key() {
        let db = setup_db().await;
        let repo = AttemptRepository::new(db.pool());

        repo.record_failed_attempt(1, "abc").await.unwrap();
        repo.record_failed_attempt(1, "abc").await.unwrap();
        repo.record_failed_attempt(2, "abc").await.unwrap();
        repo.record_failed_attempt(1, "xyz").await.unwrap();

        assert_eq!(repo.get_attempt_state(1, "abc").await.unwrap().attempts, 2);
        assert_eq!(repo.get_attempt_state(2, "abc").await.unwrap().attempts, 1);
        assert_eq!(repo.get_attempt_state(1, "xyz").await.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_clear_attempts_is_idempotent() {
        let db = setup_db().await;
        let repo = AttemptRepository::new(db.pool());

        repo.record_failed_attempt(1, "abc").await.unwrap();
        repo.record_failed_attempt(2, "abc").await.unwrap();

        assert!(repo.clear_attempts(1, "abc").await.unwrap());
        assert!(!repo.clear_attempts(1, "abc").await.unwrap());

        assert_eq!(
            repo.get_attempt_state(1, "abc").await.unwrap(),
            AttemptState::empty()
        );
        // Other users keep their counters
        assert_eq!(repo.get_attempt_state(2, "abc").await.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_reserve_stops_at_max_attempts() {
        let db = setup_db().await;
        let repo = AttemptRepository::new(db.pool());
        let now = Utc::now();
        let stale_before = now - Duration::seconds(60);

        for expected in 1..=3 {
            let state = repo
                .reserve_attempt_at(1, "abc", 3, stale_before, now)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(state.attempts, expected);
        }

        let refused = repo
            .reserve_attempt_at(1, "abc", 3, stale_before, now)
            .await
            .unwrap();
        assert!(refused.is_none());
        assert_eq!(repo.get_attempt_state(1, "abc").await.unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn test_reserve_restarts_stale_counter() {
        let db = setup_db().await;
        let repo = AttemptRepository::new(db.pool());
        let now = Utc::now();

        for _ in 0..3 {
            repo.record_failed_attempt_at(1, "abc", now).await.unwrap();
        }

        let later = now + Duration::seconds(61);
        let state = repo
            .reserve_attempt_at(1, "abc", 3, later - Duration::seconds(60), later)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.attempts, 1);
        assert_eq!(state.last_attempt_at, Some(later));
    }

    #[tokio::test]
    async fn test_counter_restarts_after_clear() {
        let db = setup_db().await;
        let repo = AttemptRepository::new(db.pool());

        repo.record_failed_attempt(1, "abc").await.unwrap();
        repo.record_failed_attempt(1, "abc").await.unwrap();
        repo.clear_attempts(1, "abc").await.unwrap();

        let state = repo.record_failed_attempt(1, "abc").await.unwrap();
        assert_eq!(state.attempts, 1);
    }
}
