//! The catalog store
//!
//! In-memory maps guarded by one `RwLock`, persisted as a JSON document on
//! every mutation. Reads are cheap snapshots; the only frequent writer is
//! the prober's per-provider live-health hook.

use std::path::PathBuf;
use std::sync::RwLock;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::crypto::KeyCipher;
use crate::error::CatalogError;
use crate::types::{Provider, ProviderHealth, ProviderId, ProviderMode, Route, RouteConfig, RouteId, RouteNode};

/// Fields for creating a provider; the API key arrives in plaintext and is
/// encrypted before it touches the store
#[derive(Debug, Clone, Deserialize)]
pub struct NewProvider {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Partial provider update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderUpdate {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub models: Option<Vec<String>>,
    pub active: Option<bool>,
}

/// Fields for creating a route
#[derive(Debug, Clone, Deserialize)]
pub struct NewRoute {
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(flatten)]
    pub config: RouteConfig,
    #[serde(default)]
    pub nodes: Vec<RouteNode>,
}

/// Partial route update; `nodes: Some(..)` replaces the whole node list
#[derive(Debug, Clone, Default)]
pub struct RouteUpdate {
    pub name: Option<String>,
    pub active: Option<bool>,
    pub config: Option<RouteConfig>,
    pub nodes: Option<Vec<RouteNode>>,
}

impl RouteUpdate {
    /// Parse an update document
    ///
    /// The mode configuration is replaced only when the document carries a
    /// `mode` key; a partial body like `{"active": false}` leaves it alone.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CatalogError> {
        let config = if value.get("mode").is_some() {
            Some(
                serde_json::from_value(value.clone())
                    .map_err(|e| CatalogError::Validation(format!("invalid route config: {e}")))?,
            )
        } else {
            None
        };

        let name = value
            .get("name")
            .map(|v| {
                v.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| CatalogError::Validation("route name must be a string".to_owned()))
            })
            .transpose()?;

        let active = value
            .get("active")
            .map(|v| {
                v.as_bool()
                    .ok_or_else(|| CatalogError::Validation("active must be a boolean".to_owned()))
            })
            .transpose()?;

        let nodes = value
            .get("nodes")
            .cloned()
            .map(|v| {
                serde_json::from_value(v).map_err(|e| CatalogError::Validation(format!("invalid route nodes: {e}")))
            })
            .transpose()?;

        Ok(Self {
            name,
            active,
            config,
            nodes,
        })
    }
}

/// Serialized shape of the catalog document
#[derive(Debug, Serialize, Deserialize)]
struct CatalogState {
    #[serde(default)]
    providers: IndexMap<ProviderId, Provider>,
    #[serde(default)]
    routes: IndexMap<RouteId, Route>,
    #[serde(default = "default_next_id")]
    next_provider_id: u64,
    #[serde(default = "default_next_id")]
    next_route_id: u64,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            providers: IndexMap::new(),
            routes: IndexMap::new(),
            next_provider_id: default_next_id(),
            next_route_id: default_next_id(),
        }
    }
}

/// The provider/route catalog
pub struct Catalog {
    inner: RwLock<CatalogState>,
    cipher: KeyCipher,
    path: Option<PathBuf>,
    changes: watch::Sender<u64>,
}

impl Catalog {
    /// Open a catalog, loading the JSON document at `path` when it exists
    pub fn open(path: Option<PathBuf>, secret: &str) -> Result<Self, CatalogError> {
        let mut state = CatalogState::default();

        if let Some(ref p) = path
            && p.exists()
        {
            let raw = std::fs::read_to_string(p)?;
            state = serde_json::from_str(&raw)
                .map_err(|e| CatalogError::Validation(format!("invalid catalog document: {e}")))?;

            // Keep id counters ahead of whatever the document holds
            let max_provider = state.providers.keys().max().copied().unwrap_or(0);
            let max_route = state.routes.keys().max().copied().unwrap_or(0);
            state.next_provider_id = state.next_provider_id.max(max_provider + 1);
            state.next_route_id = state.next_route_id.max(max_route + 1);
        }

        let (changes, _) = watch::channel(0);

        Ok(Self {
            inner: RwLock::new(state),
            cipher: KeyCipher::derive(secret),
            path,
            changes,
        })
    }

    /// Ephemeral catalog for tests and `--no-persist` runs
    pub fn in_memory(secret: &str) -> Self {
        Self::open(None, secret).expect("in-memory catalog cannot fail to open")
    }

    /// Subscribe to change notifications; the value is a generation counter
    /// bumped on every CRUD mutation (live-health updates do not count)
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    // -- Providers --

    /// Snapshot of all providers in insertion order
    pub fn list_providers(&self) -> Vec<Provider> {
        let state = self.inner.read().expect("catalog lock poisoned");
        state.providers.values().cloned().collect()
    }

    /// Fetch one provider
    pub fn get_provider(&self, id: ProviderId) -> Result<Provider, CatalogError> {
        let state = self.inner.read().expect("catalog lock poisoned");
        state
            .providers
            .get(&id)
            .cloned()
            .ok_or(CatalogError::ProviderNotFound(id))
    }

    /// Create a provider, encrypting its credential
    pub fn create_provider(&self, new: NewProvider) -> Result<Provider, CatalogError> {
        let name = new.name.trim().to_owned();
        if name.is_empty() {
            return Err(CatalogError::Validation("provider name must not be empty".to_owned()));
        }
        let base_url = normalize_base_url(&new.base_url)?;
        let api_key_encrypted = self.cipher.encrypt(&new.api_key)?;

        let mut state = self.inner.write().expect("catalog lock poisoned");
        if state.providers.values().any(|p| p.name == name) {
            return Err(CatalogError::NameConflict(name));
        }

        let id = state.next_provider_id;
        state.next_provider_id += 1;

        let provider = Provider {
            id,
            name,
            base_url,
            api_key_encrypted,
            models: new.models,
            active: new.active,
            health: ProviderHealth::default(),
        };
        state.providers.insert(id, provider.clone());

        self.persist(&state);
        drop(state);
        self.notify();
        Ok(provider)
    }

    /// Apply a partial update to a provider
    pub fn update_provider(&self, id: ProviderId, update: ProviderUpdate) -> Result<Provider, CatalogError> {
        let encrypted_key = update.api_key.as_deref().map(|k| self.cipher.encrypt(k)).transpose()?;
        let base_url = update.base_url.as_deref().map(normalize_base_url).transpose()?;

        let mut state = self.inner.write().expect("catalog lock poisoned");

        if let Some(ref name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CatalogError::Validation("provider name must not be empty".to_owned()));
            }
            if state.providers.values().any(|p| p.name == name && p.id != id) {
                return Err(CatalogError::NameConflict(name.to_owned()));
            }
        }

        let provider = state
            .providers
            .get_mut(&id)
            .ok_or(CatalogError::ProviderNotFound(id))?;

        if let Some(name) = update.name {
            provider.name = name.trim().to_owned();
        }
        if let Some(url) = base_url {
            provider.base_url = url;
        }
        if let Some(models) = update.models {
            provider.models = models;
        }
        if let Some(active) = update.active {
            provider.active = active;
        }
        if let Some(key) = encrypted_key {
            provider.api_key_encrypted = key;
        }

        let updated = provider.clone();
        self.persist(&state);
        drop(state);
        self.notify();
        Ok(updated)
    }

    /// Delete a provider
    pub fn delete_provider(&self, id: ProviderId) -> Result<(), CatalogError> {
        let mut state = self.inner.write().expect("catalog lock poisoned");
        state
            .providers
            .shift_remove(&id)
            .ok_or(CatalogError::ProviderNotFound(id))?;
        self.persist(&state);
        drop(state);
        self.notify();
        Ok(())
    }

    /// Update one provider's live health fields atomically
    ///
    /// The closure runs under the store's write lock, so readers never see a
    /// half-applied probe result. Does not bump the change generation: the
    /// prober both writes and subscribes, and its own updates must not wake
    /// it again.
    pub fn update_live<F>(&self, id: ProviderId, apply: F) -> Result<ProviderHealth, CatalogError>
    where
        F: FnOnce(&mut ProviderHealth),
    {
        let mut state = self.inner.write().expect("catalog lock poisoned");
        let provider = state
            .providers
            .get_mut(&id)
            .ok_or(CatalogError::ProviderNotFound(id))?;
        apply(&mut provider.health);
        let health = provider.health.clone();
        self.persist(&state);
        Ok(health)
    }

    /// Decrypt a stored credential
    pub fn decrypt(&self, ciphertext: &str) -> Result<SecretString, CatalogError> {
        let plain = self.cipher.decrypt(ciphertext)?;
        Ok(SecretString::from(plain))
    }

    // -- Routes --

    /// Snapshot of all routes in insertion order
    pub fn list_routes(&self) -> Vec<Route> {
        let state = self.inner.read().expect("catalog lock poisoned");
        state.routes.values().cloned().collect()
    }

    /// Fetch one route
    pub fn get_route(&self, id: RouteId) -> Result<Route, CatalogError> {
        let state = self.inner.read().expect("catalog lock poisoned");
        state.routes.get(&id).cloned().ok_or(CatalogError::RouteNotFound(id))
    }

    /// Look a route up by its client-facing name
    pub fn find_route_by_name(&self, name: &str) -> Option<Route> {
        let state = self.inner.read().expect("catalog lock poisoned");
        state.routes.values().find(|r| r.name == name).cloned()
    }

    /// Create a route after validating it against the provider catalog
    pub fn create_route(&self, new: NewRoute) -> Result<Route, CatalogError> {
        let name = new.name.trim().to_owned();
        if name.is_empty() {
            return Err(CatalogError::Validation("route name must not be empty".to_owned()));
        }

        let mut state = self.inner.write().expect("catalog lock poisoned");
        if state.routes.values().any(|r| r.name == name) {
            return Err(CatalogError::NameConflict(name));
        }
        validate_route(&state, &new.config, &new.nodes)?;

        let id = state.next_route_id;
        state.next_route_id += 1;

        let route = Route {
            id,
            name,
            active: new.active,
            config: new.config,
            nodes: new.nodes,
        };
        state.routes.insert(id, route.clone());

        self.persist(&state);
        drop(state);
        self.notify();
        Ok(route)
    }

    /// Apply a partial update to a route
    pub fn update_route(&self, id: RouteId, update: RouteUpdate) -> Result<Route, CatalogError> {
        let mut state = self.inner.write().expect("catalog lock poisoned");

        if let Some(ref name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CatalogError::Validation("route name must not be empty".to_owned()));
            }
            if state.routes.values().any(|r| r.name == name && r.id != id) {
                return Err(CatalogError::NameConflict(name.to_owned()));
            }
        }

        let current = state.routes.get(&id).ok_or(CatalogError::RouteNotFound(id))?;
        let config = update.config.clone().unwrap_or_else(|| current.config.clone());
        let nodes = update.nodes.clone().unwrap_or_else(|| current.nodes.clone());
        validate_route(&state, &config, &nodes)?;

        let route = state.routes.get_mut(&id).ok_or(CatalogError::RouteNotFound(id))?;
        if let Some(name) = update.name {
            route.name = name.trim().to_owned();
        }
        if let Some(active) = update.active {
            route.active = active;
        }
        route.config = config;
        route.nodes = nodes;

        let updated = route.clone();
        self.persist(&state);
        drop(state);
        self.notify();
        Ok(updated)
    }

    /// Delete a route
    pub fn delete_route(&self, id: RouteId) -> Result<(), CatalogError> {
        let mut state = self.inner.write().expect("catalog lock poisoned");
        state.routes.shift_remove(&id).ok_or(CatalogError::RouteNotFound(id))?;
        self.persist(&state);
        drop(state);
        self.notify();
        Ok(())
    }

    // -- Internal --

    /// Write the catalog document; persistence failures are logged, not
    /// surfaced, so a full disk never takes the gateway down
    fn persist(&self, state: &CatalogState) {
        let Some(ref path) = self.path else { return };

        let rendered = match serde_json::to_string_pretty(state) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize catalog document");
                return;
            }
        };

        if let Err(e) = std::fs::write(path, rendered) {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist catalog document");
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }
}

/// Normalize and validate a base URL; trailing slashes are stripped so URL
/// joining stays uniform
fn normalize_base_url(raw: &str) -> Result<String, CatalogError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed =
        url::Url::parse(trimmed).map_err(|e| CatalogError::Validation(format!("invalid base_url `{raw}`: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CatalogError::Validation(format!(
            "base_url must be http(s), got `{raw}`"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Route validation against the provider catalog
fn validate_route(state: &CatalogState, config: &RouteConfig, nodes: &[RouteNode]) -> Result<(), CatalogError> {
    for node in nodes {
        let provider = state
            .providers
            .get(&node.provider_id)
            .ok_or_else(|| CatalogError::Validation(format!("node references unknown provider {}", node.provider_id)))?;
        for model in &node.models {
            if !provider.models.contains(model) {
                return Err(CatalogError::Validation(format!(
                    "model `{model}` is not declared by provider `{}`",
                    provider.name
                )));
            }
        }
    }

    match config {
        RouteConfig::Auto {
            provider_mode: ProviderMode::Provider(id),
            selected_models,
        } => {
            let provider = state
                .providers
                .get(id)
                .ok_or_else(|| CatalogError::Validation(format!("route pins unknown provider {id}")))?;
            for model in selected_models {
                if !provider.models.contains(model) {
                    return Err(CatalogError::Validation(format!(
                        "model `{model}` is not declared by provider `{}`",
                        provider.name
                    )));
                }
            }
        }
        RouteConfig::Specific { selected_models } => {
            let node = nodes
                .first()
                .ok_or_else(|| CatalogError::Validation("specific routes need exactly one node".to_owned()))?;
            if let Some(provider) = state.providers.get(&node.provider_id) {
                for model in selected_models {
                    if !provider.models.contains(model) {
                        return Err(CatalogError::Validation(format!(
                            "model `{model}` is not declared by provider `{}`",
                            provider.name
                        )));
                    }
                }
            }
        }
        RouteConfig::Multi => {
            if nodes.is_empty() {
                return Err(CatalogError::Validation("multi routes need at least one node".to_owned()));
            }
        }
        RouteConfig::Auto { .. } => {}
    }

    Ok(())
}

fn default_true() -> bool {
    true
}

const fn default_next_id() -> u64 {
    1
}
