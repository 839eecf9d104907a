//! Runner configuration.

use std::time::Duration;

/// Runner-level configuration: concurrency, deadlines and logging.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum number of concurrent runs before load shedding.
    pub max_concurrent_operations: u32,
    /// Deadline applied to runs that do not set one. `None` means no deadline.
    pub default_timeout_ms: Option<u64>,
    /// How long `Runner::shutdown` waits for in-flight runs to settle.
    pub drain_timeout_ms: u64,
    pub log: LogConfig,
}

impl RunnerConfig {
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: 1000,
            default_timeout_ms: None,
            drain_timeout_ms: 5_000,
            log: LogConfig::default(),
        }
    }
}

/// Logging output settings.
///
/// `RUST_LOG`, when set, takes precedence over `level`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.max_concurrent_operations, 1000);
        assert_eq!(config.default_timeout_ms, None);
        assert_eq!(config.drain_timeout(), Duration::from_secs(5));
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
    }
}
