use std::time::Duration;

/// Configuration errors reported when building quotas or throttlers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A quota must allow at least one execution per window.
    #[error("quota must allow at least one execution per window")]
    ZeroExecutions,

    /// A quota window must be a positive duration.
    #[error("quota window must be a positive duration")]
    ZeroWindow,

    /// A throttler needs at least one quota to enforce.
    #[error("throttler requires at least one quota")]
    NoQuotas,
}

/// An execution quota: at most `max_executions` grants within any interval
/// of `window` length.
///
/// Quotas are immutable once built; invalid combinations are rejected at
/// construction so a [`Throttler`](crate::Throttler) never has to re-check
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    window: Duration,
    max_executions: usize,
}

impl Quota {
    /// Creates a quota of `max_executions` per `window`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroExecutions`] if `max_executions` is zero
    /// and [`ConfigError::ZeroWindow`] if `window` is zero.
    pub fn new(window: Duration, max_executions: usize) -> Result<Self, ConfigError> {
        if max_executions == 0 {
            return Err(ConfigError::ZeroExecutions);
        }
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self {
            window,
            max_executions,
        })
    }

    /// Convenience constructor for `max_executions` per second.
    pub fn per_second(max_executions: usize) -> Result<Self, ConfigError> {
        Self::new(Duration::from_secs(1), max_executions)
    }

    /// Convenience constructor for `max_executions` per minute.
    pub fn per_minute(max_executions: usize) -> Result<Self, ConfigError> {
        Self::new(Duration::from_secs(60), max_executions)
    }

    /// The sliding window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The number of executions allowed within [`window`](Self::window).
    pub fn max_executions(&self) -> usize {
        self.max_executions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_rejects_zero_executions() {
        assert_eq!(
            Quota::new(Duration::from_secs(1), 0),
            Err(ConfigError::ZeroExecutions)
        );
    }

    #[test]
    fn it_rejects_zero_window() {
        assert_eq!(Quota::new(Duration::ZERO, 5), Err(ConfigError::ZeroWindow));
    }

    #[test]
    fn it_builds_helpers() {
        let q = Quota::per_second(10).unwrap();
        assert_eq!(q.window(), Duration::from_secs(1));
        assert_eq!(q.max_executions(), 10);

        let q = Quota::per_minute(100).unwrap();
        assert_eq!(q.window(), Duration::from_secs(60));
        assert_eq!(q.max_executions(), 100);
    }
}
