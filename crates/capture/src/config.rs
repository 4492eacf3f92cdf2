use std::time::Duration;

/// Configurable options for a capture engine instance.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Minimum wall-clock spacing between two emitted frames.
    ///
    /// Adjustable at runtime through [`crate::IntervalHandle`]; updates
    /// take effect at the next gate check.
    pub capture_interval: Duration,

    /// Consecutive read failures before the primary loop hands off to
    /// fallback (and before the fallback loop re-resolves its quality).
    pub failure_threshold: u32,

    /// Delay before the one-shot startup open retry and before each
    /// fallback re-resolution.
    pub reopen_delay: Duration,

    /// Per-iteration yield so a hot read loop cannot starve other work.
    pub idle_sleep: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_secs(15),
            failure_threshold: 5,
            reopen_delay: Duration::from_secs(5),
            idle_sleep: Duration::from_millis(10),
        }
    }
}

impl CaptureConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            capture_interval: interval,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = CaptureConfig::default();
        assert_eq!(config.capture_interval, Duration::from_secs(15));
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.reopen_delay, Duration::from_secs(5));
        assert_eq!(config.idle_sleep, Duration::from_millis(10));
    }
}
