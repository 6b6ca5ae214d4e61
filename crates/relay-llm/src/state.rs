//! Dispatch pipeline
//!
//! Resolves the route named by the request, drives the selector, invokes
//! the provider's dialect adapter, and retries across alternative
//! providers on transient failure. Streaming requests fail over only
//! until the upstream stream is handed to the client; after that, errors
//! travel in-band.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use relay_catalog::{Catalog, Route};
use relay_config::{DispatchConfig, HealthCheckConfig};
use relay_core::{completion_id, join_url, unix_now};
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;

use crate::dialect::{self, ChunkStream, DialectAdapter, RequestAuth};
use crate::error::GatewayError;
use crate::health::HealthProber;
use crate::registry::ProviderRegistry;
use crate::selector::{RouteSelector, Selection};
use crate::types::{ChatRequest, ChatResponse, StreamContext};

/// Shared state for the gateway endpoints
#[derive(Clone)]
pub struct GatewayState {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    catalog: Arc<Catalog>,
    registry: ProviderRegistry,
    selector: RouteSelector,
    prober: Arc<HealthProber>,
    http: reqwest::Client,
    config: DispatchConfig,
    health_enabled: bool,
}

impl GatewayState {
    /// Build the gateway state; the prober is constructed but not started
    pub fn new(catalog: Arc<Catalog>, health: HealthCheckConfig, dispatch: DispatchConfig) -> Self {
        let health_enabled = health.enabled;
        Self {
            inner: Arc::new(GatewayInner {
                registry: ProviderRegistry::new(Arc::clone(&catalog)),
                selector: RouteSelector::new(Arc::clone(&catalog)),
                prober: Arc::new(HealthProber::new(Arc::clone(&catalog), health)),
                catalog,
                http: reqwest::Client::new(),
                config: dispatch,
                health_enabled,
            }),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.inner.registry
    }

    pub fn selector(&self) -> &RouteSelector {
        &self.inner.selector
    }

    pub fn prober(&self) -> &Arc<HealthProber> {
        &self.inner.prober
    }

    /// Start the background prober when enabled
    pub fn spawn_prober(&self, shutdown: CancellationToken) -> Option<tokio::task::JoinHandle<()>> {
        if !self.inner.health_enabled {
            tracing::info!("health prober disabled by configuration");
            return None;
        }
        Some(self.inner.prober.spawn(shutdown))
    }

    /// Resolve the request's `model` field to a route and model hint
    ///
    /// A name match wins and carries no hint (the field named the route).
    /// Otherwise the first active auto/all route catches the request, with
    /// the model field as hint when some provider declares it.
    fn resolve_route(&self, requested_model: &str) -> Result<(Route, Option<String>), GatewayError> {
        if let Some(route) = self.inner.catalog.find_route_by_name(requested_model) {
            if !route.active {
                return Err(GatewayError::RouteNotActive {
                    route: route.name.clone(),
                });
            }
            return Ok((route, None));
        }

        let fallback = self
            .inner
            .selector
            .fallback_route()
            .ok_or(GatewayError::NoProviderAvailable)?;

        let hint = self
            .inner
            .selector
            .model_declared(requested_model)
            .then(|| requested_model.to_owned());

        tracing::debug!(
            requested_model,
            route = %fallback.name,
            hint = ?hint,
            "no route matched by name, using auto/all fallback"
        );

        Ok((fallback, hint))
    }

    /// Execute a non-streaming completion with cross-provider retry
    pub async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, GatewayError> {
        let (route, hint) = self.resolve_route(&request.model)?;
        let mut exclude: HashSet<relay_catalog::ProviderId> = HashSet::new();
        let mut failed_attempts = 0u32;

        for attempt in 1..=self.inner.config.max_attempts {
            let selection = match self.inner.selector.select_route(&route, hint.as_deref(), &exclude) {
                Ok(selection) => selection,
                Err(GatewayError::NoProviderAvailable) if failed_attempts > 0 => {
                    return Err(GatewayError::UpstreamUnavailable {
                        attempts: failed_attempts,
                    });
                }
                Err(e) => return Err(e),
            };

            match self.attempt_complete(&request, &selection).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retriable() => {
                    tracing::warn!(
                        route = %route.name,
                        provider = %selection.provider_name,
                        model = %selection.model,
                        attempt,
                        error = %e,
                        "provider attempt failed, trying an alternative"
                    );
                    exclude.insert(selection.provider_id);
                    failed_attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Err(GatewayError::UpstreamUnavailable {
            attempts: failed_attempts,
        })
    }

    /// Execute a streaming completion with retry before the first byte
    ///
    /// Returns the chosen model and the canonical chunk stream. Once this
    /// returns `Ok`, failures are the stream's problem.
    pub async fn complete_stream(&self, request: ChatRequest) -> Result<(String, ChunkStream), GatewayError> {
        let (route, hint) = self.resolve_route(&request.model)?;
        let mut exclude: HashSet<relay_catalog::ProviderId> = HashSet::new();
        let mut failed_attempts = 0u32;

        for attempt in 1..=self.inner.config.max_attempts {
            let selection = match self.inner.selector.select_route(&route, hint.as_deref(), &exclude) {
                Ok(selection) => selection,
                Err(GatewayError::NoProviderAvailable) if failed_attempts > 0 => {
                    return Err(GatewayError::UpstreamUnavailable {
                        attempts: failed_attempts,
                    });
                }
                Err(e) => return Err(e),
            };

            match self.attempt_stream(&request, &selection).await {
                Ok(stream) => return Ok((selection.model, stream)),
                Err(e) if e.is_retriable() => {
                    tracing::warn!(
                        route = %route.name,
                        provider = %selection.provider_name,
                        model = %selection.model,
                        attempt,
                        error = %e,
                        "provider stream attempt failed, trying an alternative"
                    );
                    exclude.insert(selection.provider_id);
                    failed_attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Err(GatewayError::UpstreamUnavailable {
            attempts: failed_attempts,
        })
    }

    // -- Single attempts --

    async fn attempt_complete(&self, request: &ChatRequest, selection: &Selection) -> Result<ChatResponse, GatewayError> {
        let (builder, adapter, ctx) = self.prepare(request, selection, false)?;
        let response = self.send_upstream(builder, &selection.provider_name).await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Adapter(format!("failed to read upstream response: {e}")))?;

        adapter.translate_response(body, &ctx)
    }

    async fn attempt_stream(&self, request: &ChatRequest, selection: &Selection) -> Result<ChunkStream, GatewayError> {
        let (builder, adapter, ctx) = self.prepare(request, selection, true)?;
        let response = self.send_upstream(builder, &selection.provider_name).await?;
        Ok(adapter.stream_chunks(response, ctx))
    }

    /// Translate the request and build the authenticated upstream call
    fn prepare(
        &self,
        request: &ChatRequest,
        selection: &Selection,
        stream: bool,
    ) -> Result<(reqwest::RequestBuilder, &'static dyn DialectAdapter, StreamContext), GatewayError> {
        let provider = self.inner.catalog.get_provider(selection.provider_id)?;
        let adapter = dialect::adapter_for(dialect::detect_dialect(&provider.name, &provider.base_url));

        let credential = self
            .inner
            .catalog
            .decrypt(&provider.api_key_encrypted)
            .map_err(|_| GatewayError::Decrypt {
                provider: provider.name.clone(),
            })?;

        let mut wire = request.clone();
        wire.stream = stream;
        let body = adapter.translate_request(&wire, &selection.model)?;

        let url = join_url(&provider.base_url, &adapter.endpoint_path(&selection.model, stream));
        let ctx = StreamContext {
            id: completion_id(),
            model: selection.model.clone(),
            created: unix_now(),
        };

        let mut builder = self
            .inner
            .http
            .post(url)
            .json(&body)
            .timeout(Duration::from_secs_f64(self.inner.config.request_timeout_seconds));

        builder = match adapter.auth(credential.expose_secret()) {
            RequestAuth::Headers(headers) => headers
                .into_iter()
                .fold(builder, |builder, (name, value)| builder.header(name, value)),
            RequestAuth::Query { key, value } => builder.query(&[(key, value)]),
        };

        Ok((builder, adapter, ctx))
    }

    /// Send one upstream request and classify transport/status failures
    async fn send_upstream(
        &self,
        builder: reqwest::RequestBuilder,
        provider_name: &str,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::UpstreamTimeout {
                    provider: provider_name.to_owned(),
                }
            } else {
                GatewayError::UpstreamUnreachable { detail: e.to_string() }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider = provider_name, status = %status, "upstream returned error");

        if status.is_client_error() {
            Err(GatewayError::UpstreamClient {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(GatewayError::UpstreamServer {
                status: status.as_u16(),
                body,
            })
        }
    }
}
