//! Password check for shared-link access.
//!
//! Combines the file registry, the attempt counters and the lockout policy
//! into the flow a bot handler runs when a user types a password for a
//! protected file.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::attempts::AttemptRepository;
use super::policy::{AttemptPolicy, GuardDecision};
use crate::db::DbPool;
use crate::registry::{FileRecord, FileRepository};
use crate::Result;

/// Result of a password check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    /// Access granted: the file is unprotected or the password matched.
    Granted(FileRecord),
    /// Wrong password.
    Denied {
        /// Failures left before lockout.
        remaining: u32,
    },
    /// Too many failures; the password was not checked.
    Locked {
        /// Time until the lockout ends.
        retry_after: Duration,
    },
    /// No file has this public UUID.
    NotFound,
}

impl AccessOutcome {
    /// Check if access was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessOutcome::Granted(_))
    }
}

/// Guards password-protected files against guessing.
pub struct AccessGuard<'a> {
    pool: &'a DbPool,
    policy: AttemptPolicy,
}

impl<'a> AccessGuard<'a> {
    /// Create a guard enforcing `policy`.
    pub fn new(pool: &'a DbPool, policy: AttemptPolicy) -> Self {
        Self { pool, policy }
    }

    /// The policy in force.
    pub fn policy(&self) -> &AttemptPolicy {
        &self.policy
    }

    /// Check `password` for `user_id` opening the file `public_uuid`.
    pub async fn check_password(
        &self,
        user_id: i64,
        public_uuid: &str,
        password: &str,
    ) -> Result<AccessOutcome> {
        self.check_password_at(user_id, public_uuid, password, Utc::now())
            .await
    }

    /// Same as [`check_password`](Self::check_password) with an explicit clock.
    pub async fn check_password_at(
        &self,
        user_id: i64,
        public_uuid: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessOutcome> {
        let files = FileRepository::new(self.pool);
        let attempts = AttemptRepository::new(self.pool);

        let Some(record) = files.fetch(public_uuid, None).await? else {
            return Ok(AccessOutcome::NotFound);
        };
        if !record.is_protected {
            return Ok(AccessOutcome::Granted(record));
        }

        // The check is counted before the password is compared
        let stale_before = self.policy.stale_before(now);
        let reserved = attempts
            .reserve_attempt_at(
                user_id,
                public_uuid,
                self.policy.max_attempts(),
                stale_before,
                now,
            )
            .await?;
        let Some(state) = reserved else {
            let state = attempts.get_attempt_state(user_id, public_uuid).await?;
            let retry_after = match self.policy.evaluate(&state, now) {
                GuardDecision::Locked { retry_after } => retry_after,
                GuardDecision::Allowed { .. } => Duration::ZERO,
            };
            warn!(
                user_id = user_id,
                public_uuid = %public_uuid,
                retry_after_secs = retry_after.as_secs(),
                "Password attempt while locked out"
            );
            return Ok(AccessOutcome::Locked { retry_after });
        };

        if record.check_password(password) {
            attempts.clear_attempts(user_id, public_uuid).await?;
            info!(user_id = user_id, public_uuid = %public_uuid, "Password accepted");
            return Ok(AccessOutcome::Granted(record));
        }

        match self.policy.evaluate(&state, now) {
            GuardDecision::Allowed { remaining } => Ok(AccessOutcome::Denied { remaining }),
            GuardDecision::Locked { retry_after } => {
                warn!(
                    user_id = user_id,
                    public_uuid = %public_uuid,
                    attempts = state.attempts,
                    "Too many wrong passwords, locking"
                );
                Ok(AccessOutcome::Locked { retry_after })
            }
        }
    }
}
