use cogito_core::{CogitoError, CogitoResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds the optimistic retry loop in
/// [`SessionStore::compare_and_swap`](crate::SessionStore::compare_and_swap).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Conflicting attempts allowed after the first before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in microseconds for exponential backoff. Zero only yields.
    #[serde(default = "default_backoff_base_us")]
    pub backoff_base_us: u64,
    /// Cap for the exponential backoff, in microseconds.
    #[serde(default = "default_backoff_max_us")]
    pub backoff_max_us: u64,
}

fn default_max_retries() -> u32 {
    128
}

fn default_backoff_base_us() -> u64 {
    10
}

fn default_backoff_max_us() -> u64 {
    2_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_us: default_backoff_base_us(),
            backoff_max_us: default_backoff_max_us(),
        }
    }
}

impl RetryPolicy {
    /// Retry immediately without sleeping, up to `max_retries` times.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_base_us: 0,
            backoff_max_us: 0,
        }
    }

    /// Total attempts, the first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retrying after the `attempt`-th (0-based) conflict.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .backoff_base_us
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_micros(delay.min(self.backoff_max_us))
    }

    /// Reject a base delay larger than the cap.
    pub fn validate(&self) -> CogitoResult<()> {
        if self.backoff_base_us > self.backoff_max_us {
            return Err(CogitoError::Config(format!(
                "retry.backoff_base_us ({}) exceeds retry.backoff_max_us ({})",
                self.backoff_base_us, self.backoff_max_us
            )));
        }
        Ok(())
    }
}

/// Capacity settings for the in-memory store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of sessions held at once. Unbounded when absent.
    #[serde(default)]
    pub max_sessions: Option<usize>,
}

impl StoreConfig {
    /// Reject a zero capacity.
    pub fn validate(&self) -> CogitoResult<()> {
        if self.max_sessions == Some(0) {
            return Err(CogitoError::Config(
                "store.max_sessions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Defaults applied by [`ThinkingService`](crate::ThinkingService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    /// Estimate used when `start` is called without one.
    #[serde(default = "default_estimated_steps")]
    pub default_estimated_steps: u32,
}

fn default_estimated_steps() -> u32 {
    5
}

impl Default for ThinkingConfig {
    fn default() -> Self {
        Self {
            default_estimated_steps: default_estimated_steps(),
        }
    }
}

impl ThinkingConfig {
    /// Reject a zero default estimate.
    pub fn validate(&self) -> CogitoResult<()> {
        if self.default_estimated_steps == 0 {
            return Err(CogitoError::Config(
                "thinking.default_estimated_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            backoff_base_us: 10,
            backoff_max_us: 100,
        };
        assert_eq!(policy.backoff(0), Duration::from_micros(10));
        assert_eq!(policy.backoff(1), Duration::from_micros(20));
        assert_eq!(policy.backoff(3), Duration::from_micros(80));
        assert_eq!(policy.backoff(4), Duration::from_micros(100));
        assert_eq!(policy.backoff(60), Duration::from_micros(100));
    }

    #[test]
    fn test_immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff(0), Duration::ZERO);
        assert_eq!(policy.backoff(31), Duration::ZERO);
    }

    #[test]
    fn test_max_attempts_saturates() {
        assert_eq!(RetryPolicy::immediate(u32::MAX).max_attempts(), u32::MAX);
    }

    #[test]
    fn test_validation() {
        assert!(RetryPolicy::default().validate().is_ok());
        let inverted = RetryPolicy {
            max_retries: 1,
            backoff_base_us: 50,
            backoff_max_us: 10,
        };
        assert!(matches!(inverted.validate(), Err(CogitoError::Config(_))));

        assert!(StoreConfig::default().validate().is_ok());
        let zero = StoreConfig {
            max_sessions: Some(0),
        };
        assert!(zero.validate().is_err());

        let no_steps = ThinkingConfig {
            default_estimated_steps: 0,
        };
        assert!(no_steps.validate().is_err());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_retries": 4}"#).unwrap();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.backoff_base_us, 10);
        assert_eq!(policy.backoff_max_us, 2_000);
    }
}
