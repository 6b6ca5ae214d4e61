//! Read view of the provider catalog with live health attributes
//!
//! Selection reads go through here; the prober and the admin health
//! override are the only writers, and each write touches exactly one
//! provider's live fields inside the catalog's critical section.

use std::sync::Arc;

use relay_catalog::{Catalog, CatalogError, Provider, ProviderHealth, ProviderId};

/// Registry over the shared catalog
#[derive(Clone)]
pub struct ProviderRegistry {
    catalog: Arc<Catalog>,
}

impl ProviderRegistry {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Snapshot of providers an admin has enabled
    pub fn list_active(&self) -> Vec<Provider> {
        self.catalog.list_providers().into_iter().filter(|p| p.active).collect()
    }

    /// Snapshot of providers that may receive traffic right now
    pub fn list_eligible(&self) -> Vec<Provider> {
        self.catalog
            .list_providers()
            .into_iter()
            .filter(Provider::eligible)
            .collect()
    }

    /// Fetch one provider
    pub fn get(&self, id: ProviderId) -> Result<Provider, CatalogError> {
        self.catalog.get_provider(id)
    }

    /// Whether the provider is active and healthy
    pub fn eligible(&self, id: ProviderId) -> bool {
        self.catalog.get_provider(id).is_ok_and(|p| p.eligible())
    }

    /// Manual health override
    ///
    /// Writes the flag directly and zeroes the failure counter; the next
    /// probe result is authoritative and may overwrite it.
    pub fn set_health(&self, id: ProviderId, healthy: bool) -> Result<ProviderHealth, CatalogError> {
        self.catalog.update_live(id, |health| {
            health.healthy = healthy;
            health.consecutive_failures = 0;
        })
    }
}
