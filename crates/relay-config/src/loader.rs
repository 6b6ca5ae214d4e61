use std::path::Path;

use secrecy::ExposeSecret;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.catalog.secret.expose_secret().is_empty() {
            anyhow::bail!("catalog.secret must not be empty");
        }
        if self.health.interval_seconds <= 0.0 {
            anyhow::bail!("health.interval_seconds must be positive");
        }
        if self.health.timeout_seconds <= 0.0 {
            anyhow::bail!("health.timeout_seconds must be positive");
        }
        if self.health.failure_threshold == 0 {
            anyhow::bail!("health.failure_threshold must be at least 1");
        }
        if self.health.max_concurrent == 0 {
            anyhow::bail!("health.max_concurrent must be at least 1");
        }
        if self.dispatch.max_attempts == 0 {
            anyhow::bail!("dispatch.max_attempts must be at least 1");
        }
        if self.dispatch.request_timeout_seconds <= 0.0 {
            anyhow::bail!("dispatch.request_timeout_seconds must be positive");
        }
        Ok(())
    }
}
