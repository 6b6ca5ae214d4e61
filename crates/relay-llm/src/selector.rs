//! Route selection
//!
//! Given a route and an optional model hint, picks a concrete
//! (provider, model) pair honoring the route mode, per-node strategy,
//! provider health, and per-route rotation cursors. Dispatch passes an
//! exclude set to mask providers that already failed within one request.

use std::collections::HashSet;
use std::sync::Arc;

use relay_catalog::{Catalog, NodeStrategy, Provider, ProviderId, ProviderMode, Route, RouteConfig, RouteId};

use crate::error::GatewayError;
use crate::registry::ProviderRegistry;
use crate::rotation::{CursorScope, RotationState};

/// A concrete selection result
#[derive(Debug, Clone, serde::Serialize)]
pub struct Selection {
    pub provider_id: ProviderId,
    pub provider_name: String,
    pub model: String,
}

/// The selector; performs no I/O and never suspends
pub struct RouteSelector {
    catalog: Arc<Catalog>,
    registry: ProviderRegistry,
    rotation: RotationState,
}

impl RouteSelector {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            registry: ProviderRegistry::new(Arc::clone(&catalog)),
            catalog,
            rotation: RotationState::new(),
        }
    }

    /// Access the rotation state (route deletion clears its cursors)
    pub fn rotation(&self) -> &RotationState {
        &self.rotation
    }

    /// Select a (provider, model) pair for a route id
    pub fn select(
        &self,
        route_id: RouteId,
        model_hint: Option<&str>,
        exclude: &HashSet<ProviderId>,
    ) -> Result<Selection, GatewayError> {
        let route = self
            .catalog
            .get_route(route_id)
            .map_err(|_| GatewayError::RouteNotActive {
                route: route_id.to_string(),
            })?;
        self.select_route(&route, model_hint, exclude)
    }

    /// Select a (provider, model) pair for an already-resolved route
    pub fn select_route(
        &self,
        route: &Route,
        model_hint: Option<&str>,
        exclude: &HashSet<ProviderId>,
    ) -> Result<Selection, GatewayError> {
        if !route.active {
            return Err(GatewayError::RouteNotActive {
                route: route.name.clone(),
            });
        }

        match &route.config {
            RouteConfig::Auto {
                provider_mode,
                selected_models,
            } => self.select_auto(route, *provider_mode, selected_models, model_hint, exclude),
            RouteConfig::Specific { selected_models } => {
                self.select_specific(route, selected_models, model_hint, exclude)
            }
            RouteConfig::Multi => self.select_multi(route, model_hint, exclude),
        }
    }

    /// First active auto/all route, used when a request's model names no route
    pub fn fallback_route(&self) -> Option<Route> {
        self.catalog.list_routes().into_iter().find(|route| {
            route.active
                && matches!(
                    route.config,
                    RouteConfig::Auto {
                        provider_mode: ProviderMode::All,
                        ..
                    }
                )
        })
    }

    /// Whether any provider declares the given model
    pub fn model_declared(&self, model: &str) -> bool {
        self.catalog
            .list_providers()
            .iter()
            .any(|p| p.models.iter().any(|m| m == model))
    }

    fn eligible_providers(&self, exclude: &HashSet<ProviderId>) -> Vec<Provider> {
        self.registry
            .list_eligible()
            .into_iter()
            .filter(|p| !exclude.contains(&p.id))
            .collect()
    }

    // -- auto --

    fn select_auto(
        &self,
        route: &Route,
        provider_mode: ProviderMode,
        selected_models: &[String],
        model_hint: Option<&str>,
        exclude: &HashSet<ProviderId>,
    ) -> Result<Selection, GatewayError> {
        let provider = match provider_mode {
            ProviderMode::All => {
                let eligible = self.eligible_providers(exclude);
                // With configured models, only providers declaring one of
                // them join the ring; with none, any eligible provider does
                let ring: Vec<&Provider> = if selected_models.is_empty() {
                    eligible.iter().collect()
                } else {
                    eligible
                        .iter()
                        .filter(|p| p.models.iter().any(|m| selected_models.contains(m)))
                        .collect()
                };
                if ring.is_empty() {
                    return Err(GatewayError::NoProviderAvailable);
                }
                let idx = self.rotation.advance(route.id, CursorScope::Providers, ring.len());
                ring[idx].clone()
            }
            ProviderMode::Provider(id) => {
                let provider = self
                    .registry
                    .get(id)
                    .map_err(|_| GatewayError::NoProviderAvailable)?;
                if !provider.eligible() || exclude.contains(&provider.id) {
                    return Err(GatewayError::NoProviderAvailable);
                }
                provider
            }
        };

        let model = self.pick_auto_model(route, &provider, selected_models, model_hint)?;
        Ok(Selection {
            provider_id: provider.id,
            provider_name: provider.name,
            model,
        })
    }

    fn pick_auto_model(
        &self,
        route: &Route,
        provider: &Provider,
        selected_models: &[String],
        model_hint: Option<&str>,
    ) -> Result<String, GatewayError> {
        // Hint precedence: honored whenever the picked provider declares it
        // and it does not fall outside a configured model set
        if let Some(hint) = model_hint
            && provider.models.iter().any(|m| m == hint)
            && (selected_models.is_empty() || selected_models.iter().any(|m| m == hint))
        {
            return Ok(hint.to_owned());
        }

        if selected_models.is_empty() {
            return provider
                .models
                .first()
                .cloned()
                .ok_or(GatewayError::NoProviderAvailable);
        }

        let ring: Vec<&String> = selected_models
            .iter()
            .filter(|m| provider.models.contains(m))
            .collect();

        if ring.is_empty() {
            // Configured set and declared set are disjoint for this
            // provider; fall back to its first declared model
            return provider
                .models
                .first()
                .cloned()
                .ok_or(GatewayError::NoProviderAvailable);
        }

        let idx = self
            .rotation
            .advance(route.id, CursorScope::Provider(provider.id), ring.len());
        Ok(ring[idx].clone())
    }

    // -- specific --

    fn select_specific(
        &self,
        route: &Route,
        selected_models: &[String],
        model_hint: Option<&str>,
        exclude: &HashSet<ProviderId>,
    ) -> Result<Selection, GatewayError> {
        let node = route.nodes.first().ok_or(GatewayError::NoProviderAvailable)?;
        let provider = self
            .registry
            .get(node.provider_id)
            .map_err(|_| GatewayError::NoProviderAvailable)?;
        if !provider.eligible() || exclude.contains(&provider.id) {
            return Err(GatewayError::NoProviderAvailable);
        }

        let ring: &[String] = if node.models.is_empty() {
            if selected_models.is_empty() {
                &provider.models
            } else {
                selected_models
            }
        } else {
            &node.models
        };

        if let Some(hint) = model_hint
            && ring.iter().any(|m| m == hint)
        {
            return Ok(Selection {
                provider_id: provider.id,
                provider_name: provider.name,
                model: hint.to_owned(),
            });
        }

        let model = match ring.len() {
            0 => return Err(GatewayError::NoProviderAvailable),
            1 => ring[0].clone(),
            len => {
                let idx = self.rotation.advance(route.id, CursorScope::Node(0), len);
                ring[idx].clone()
            }
        };

        Ok(Selection {
            provider_id: provider.id,
            provider_name: provider.name,
            model,
        })
    }

    // -- multi --

    fn select_multi(
        &self,
        route: &Route,
        model_hint: Option<&str>,
        exclude: &HashSet<ProviderId>,
    ) -> Result<Selection, GatewayError> {
        // Node identity for cursors is the position in the stored list, so
        // re-prioritizing a route does not silently reuse another node's cursor
        let mut nodes: Vec<(usize, &relay_catalog::RouteNode)> = route.nodes.iter().enumerate().collect();
        nodes.sort_by_key(|(_, node)| node.priority);

        for (node_index, node) in nodes {
            let Ok(provider) = self.registry.get(node.provider_id) else {
                continue;
            };
            if !provider.eligible() || exclude.contains(&provider.id) {
                continue;
            }

            let ring: &[String] = if node.models.is_empty() { &provider.models } else { &node.models };
            if ring.is_empty() {
                continue;
            }

            if let Some(hint) = model_hint
                && ring.iter().any(|m| m == hint)
            {
                return Ok(Selection {
                    provider_id: provider.id,
                    provider_name: provider.name,
                    model: hint.to_owned(),
                });
            }

            let model = match node.strategy {
                NodeStrategy::Failover => ring[0].clone(),
                NodeStrategy::RoundRobin => {
                    let idx = self.rotation.advance(route.id, CursorScope::Node(node_index), ring.len());
                    ring[idx].clone()
                }
            };

            return Ok(Selection {
                provider_id: provider.id,
                provider_name: provider.name,
                model,
            });
        }

        Err(GatewayError::NoProviderAvailable)
    }
}
