use serde::Deserialize;

/// Dispatch pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum provider attempts per request, including the first
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,
    /// Per-attempt upstream request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_attempts(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

const fn default_attempts() -> u32 {
    3
}

const fn default_timeout() -> f64 {
    30.0
}
