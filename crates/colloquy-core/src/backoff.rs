//! Reconnect policy and backoff delay calculation.
//!
//! The math is portable and sync-only; the async sleep/retry loop lives in
//! `colloquy-client`, which has access to tokio. Delays are deterministic:
//! `min(initial_delay * 2^attempt, max_delay)` with no jitter, so the
//! reconnect schedule is exactly reproducible in tests.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default initial reconnect delay in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
/// Default maximum reconnect delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;
/// Default reconnect attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Reconnection parameters for the connection manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Delay before the first retry in ms (default: 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay in ms (default: 60000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Attempt ceiling beyond which reconnection is abandoned (default: 10).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_delay_ms() -> u64 {
    DEFAULT_INITIAL_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (zero-based: 0 for the first
    /// retry after the initial failure).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(reconnect_delay(
            attempt,
            self.initial_delay_ms,
            self.max_delay_ms,
        ))
    }

    /// Whether `attempt` retries have exhausted the ceiling.
    #[must_use]
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// Calculate the reconnect delay for a zero-based attempt index.
///
/// Formula: `min(initial_delay * 2^attempt, max_delay)`. The shift is
/// clamped and the multiply saturates, so arbitrarily high attempt counts
/// settle at `max_delay` instead of overflowing.
#[must_use]
pub fn reconnect_delay(attempt: u32, initial_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = initial_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exponential.min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_defaults() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.initial_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 60_000);
        assert_eq!(policy.max_attempts, 10);
    }

    #[test]
    fn serde_fills_missing_fields_with_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, ReconnectPolicy::default());
    }

    #[test]
    fn serde_camel_case_field_names() {
        let json = r#"{"initialDelayMs": 500, "maxDelayMs": 30000, "maxAttempts": 4}"#;
        let policy: ReconnectPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.initial_delay_ms, 500);
        assert_eq!(policy.max_delay_ms, 30_000);
        assert_eq!(policy.max_attempts, 4);
    }

    #[test]
    fn delay_schedule_for_first_eight_attempts() {
        let expected = [1000, 2000, 4000, 8000, 16_000, 32_000, 60_000, 60_000];
        for (attempt, want) in expected.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let got = reconnect_delay(attempt as u32, 1000, 60_000);
            assert_eq!(got, *want, "attempt {attempt}");
        }
    }

    #[test]
    fn delay_caps_at_max() {
        assert_eq!(reconnect_delay(20, 1000, 60_000), 60_000);
    }

    #[test]
    fn high_attempt_does_not_overflow() {
        assert_eq!(reconnect_delay(u32::MAX, 1000, 60_000), 60_000);
    }

    #[test]
    fn policy_delay_for_returns_duration() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(9), Duration::from_millis(60_000));
    }

    #[test]
    fn exhaustion_is_inclusive_of_ceiling() {
        let policy = ReconnectPolicy {
            max_attempts: 3,
            ..ReconnectPolicy::default()
        };
        assert!(!policy.is_exhausted(0));
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }

    #[test]
    fn custom_initial_delay_doubles() {
        assert_eq!(reconnect_delay(0, 250, 60_000), 250);
        assert_eq!(reconnect_delay(1, 250, 60_000), 500);
        assert_eq!(reconnect_delay(2, 250, 60_000), 1000);
    }
}
