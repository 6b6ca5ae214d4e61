//! Gateway configuration presets for tests

use relay_config::Config;

/// Builds a test configuration; the prober is off unless asked for so
/// dispatch tests stay deterministic
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.health.enabled = false;
        Self { config }
    }

    /// Enable the background prober with a short cycle
    pub fn with_health_interval(mut self, interval_seconds: f64) -> Self {
        self.config.health.enabled = true;
        self.config.health.interval_seconds = interval_seconds;
        self.config.health.timeout_seconds = 2.0;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.config.health.failure_threshold = threshold;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.dispatch.max_attempts = attempts;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
