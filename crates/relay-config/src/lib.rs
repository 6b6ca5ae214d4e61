//! Configuration for the relay gateway
//!
//! Loaded from a TOML file with `{{ env.VAR }}` placeholder expansion, or
//! constructed with defaults when no file is given. Every knob has a
//! default so a bare `relay` invocation starts a working gateway.

mod catalog;
mod dispatch;
mod env;
mod health;
mod loader;
mod server;

use serde::Deserialize;

pub use catalog::CatalogConfig;
pub use dispatch::DispatchConfig;
pub use health::HealthCheckConfig;
pub use server::ServerConfig;

/// Top-level relay configuration
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Provider/route catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Health prober configuration
    #[serde(default)]
    pub health: HealthCheckConfig,
    /// Dispatch pipeline configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,
}
