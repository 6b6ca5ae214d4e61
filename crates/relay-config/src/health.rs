use serde::Deserialize;

/// Health prober configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheckConfig {
    /// Whether the background prober runs at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between probe cycles
    #[serde(default = "default_interval")]
    pub interval_seconds: f64,
    /// Per-probe timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// Consecutive non-online probes before a provider is marked unhealthy
    #[serde(default = "default_threshold")]
    pub failure_threshold: u32,
    /// Maximum concurrent probes within one cycle
    #[serde(default = "default_concurrency")]
    pub max_concurrent: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_seconds: default_interval(),
            timeout_seconds: default_timeout(),
            failure_threshold: default_threshold(),
            max_concurrent: default_concurrency(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_interval() -> f64 {
    60.0
}

const fn default_timeout() -> f64 {
    5.0
}

const fn default_threshold() -> u32 {
    3
}

const fn default_concurrency() -> usize {
    8
}
