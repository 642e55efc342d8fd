//! Lockout policy over attempt counters.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::attempts::AttemptState;
use crate::config::GuardConfig;

/// Outcome of evaluating a counter against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Another attempt may be made.
    Allowed {
        /// Failures left before lockout.
        remaining: u32,
    },
    /// Attempts are rejected until the lockout ends.
    Locked {
        /// Time until the lockout ends.
        retry_after: Duration,
    },
}

impl GuardDecision {
    /// Check if an attempt is allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allowed { .. })
    }
}

/// Lock a (user, file) key after `max_attempts` failures, for `lockout`
/// counted from the most recent failure.
///
/// A counter whose last failure is older than `lockout` is stale: the key
/// is treated as having no failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPolicy {
    max_attempts: u32,
    lockout: Duration,
}

impl AttemptPolicy {
    /// Create a policy. `max_attempts` is raised to at least 1.
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout,
        }
    }

    /// Build a policy from configuration.
    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.lockout_secs))
    }

    /// Failures allowed before lockout.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Lockout duration.
    pub fn lockout(&self) -> Duration {
        self.lockout
    }

    /// Time elapsed since the last failure, if any. Clock skew reads as zero.
    fn elapsed(&self, state: &AttemptState, now: DateTime<Utc>) -> Option<Duration> {
        state
            .last_attempt_at
            .map(|last| (now - last).to_std().unwrap_or(Duration::ZERO))
    }

    /// Failures at or before this instant are outside the lockout window.
    pub fn stale_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.lockout)
            .ok()
            .and_then(|lockout| now.checked_sub_signed(lockout))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// True if the counter has outlived the lockout window.
    pub fn is_stale(&self, state: &AttemptState, now: DateTime<Utc>) -> bool {
        if state.is_empty() {
            return false;
        }
        matches!(self.elapsed(state, now), Some(elapsed) if elapsed >= self.lockout)
    }

    /// Decide whether another attempt is allowed.
    pub fn evaluate(&self, state: &AttemptState, now: DateTime<Utc>) -> GuardDecision {
        if self.is_stale(state, now) {
            return GuardDecision::Allowed {
                remaining: self.max_attempts,
            };
        }

        if state.attempts >= self.max_attempts {
            let elapsed = self.elapsed(state, now).unwrap_or(Duration::ZERO);
            return GuardDecision::Locked {
                retry_after: self.lockout.saturating_sub(elapsed),
            };
        }

        GuardDecision::Allowed {
            remaining: self.max_attempts - state.attempts,
        }
    }
}

impl Default for AttemptPolicy {
    fn default() -> Self {
        Self::from_config(&GuardConfig::default())
    }
}
