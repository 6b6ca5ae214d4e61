//! Catalog record types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque provider identifier assigned by the catalog
pub type ProviderId = u64;

/// Opaque route identifier assigned by the catalog
pub type RouteId = u64;

/// Outcome class of the most recent health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Never probed
    #[default]
    Unknown,
    /// Probe returned 2xx
    Online,
    /// Probe returned a non-2xx status
    Degraded,
    /// Probe exceeded its timeout
    Timeout,
    /// Connection could not be established (DNS, refused, TLS)
    Unreachable,
    /// Probe failed for a non-network reason
    Error,
}

/// Live health attributes owned by the prober
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Whether the provider is currently considered usable
    #[serde(default = "default_true")]
    pub healthy: bool,
    /// Consecutive non-online probe outcomes
    #[serde(default)]
    pub consecutive_failures: u32,
    /// Classification of the last probe
    #[serde(default)]
    pub last_status: ProbeStatus,
    /// Latency of the last completed probe request
    #[serde(default)]
    pub last_latency_ms: Option<f64>,
    /// Unix timestamp of the last probe
    #[serde(default)]
    pub last_probed_at: Option<u64>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            last_status: ProbeStatus::Unknown,
            last_latency_ms: None,
            last_probed_at: None,
        }
    }
}

/// An upstream LLM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    /// Unique human-readable name; also drives dialect detection
    pub name: String,
    /// Base URL the adapter endpoint path is appended to
    pub base_url: String,
    /// Encrypted credential (base64 AES-GCM blob)
    pub api_key_encrypted: String,
    /// Models the provider declares, in preference order
    #[serde(default)]
    pub models: Vec<String>,
    /// Admin intent: whether the provider may receive traffic at all
    #[serde(default = "default_true")]
    pub active: bool,
    /// Live attributes owned by the prober
    #[serde(default)]
    pub health: ProviderHealth,
}

impl Provider {
    /// Whether the provider may be selected for traffic right now
    pub fn eligible(&self) -> bool {
        self.active && self.health.healthy
    }
}

/// Provider scope of an `auto` route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderMode {
    /// Rotate across every eligible provider
    #[default]
    All,
    /// Pin to one provider
    Provider(ProviderId),
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Provider(id) => write!(f, "provider_{id}"),
        }
    }
}

impl FromStr for ProviderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self::All);
        }
        if let Some(id) = s.strip_prefix("provider_") {
            return id
                .parse()
                .map(Self::Provider)
                .map_err(|_| format!("invalid provider id in provider mode: {s}"));
        }
        Err(format!("invalid provider mode: {s}"))
    }
}

impl Serialize for ProviderMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProviderMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-node model selection strategy in a `multi` route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStrategy {
    /// Cycle through the node's models
    #[default]
    RoundRobin,
    /// Always pick the node's first model
    Failover,
}

/// One provider binding inside a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteNode {
    pub provider_id: ProviderId,
    /// Models this node allows; empty means the provider's declared list
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub strategy: NodeStrategy,
    /// Lower priority is tried first
    #[serde(default)]
    pub priority: i32,
    /// Opaque operator annotations
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Per-mode route configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RouteConfig {
    /// Rotate across providers, constrained by a configured model set
    Auto {
        #[serde(default)]
        provider_mode: ProviderMode,
        #[serde(default)]
        selected_models: Vec<String>,
    },
    /// Pin to one node's provider
    Specific {
        #[serde(default)]
        selected_models: Vec<String>,
    },
    /// Priority-ordered node list carrying all the information
    Multi,
}

/// A named selection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    /// Unique name; clients address routes by this via the `model` field
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(flatten)]
    pub config: RouteConfig,
    #[serde(default)]
    pub nodes: Vec<RouteNode>,
}

/// Mask a plaintext API key for display
///
/// Keeps a short prefix and suffix so operators can recognize a key
/// without the catalog ever echoing the full value.
pub fn mask_api_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    if key.len() <= 4 {
        return "***".to_owned();
    }
    if key.len() <= 8 {
        return format!("{}***{}", &key[..2], &key[key.len() - 2..]);
    }

    let prefix_len = (key.len() / 4).min(6);
    format!("{}***...***{}", &key[..prefix_len], &key[key.len() - 4..])
}

fn default_true() -> bool {
    true
}
