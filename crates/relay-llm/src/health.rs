//! Background health probing of upstream providers
//!
//! A long-lived task probes every active provider's `/models` endpoint on
//! an interval, classifies the outcome, and folds it into the provider's
//! live health fields. The same probe logic backs the on-demand
//! `test_provider` admin operation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{StreamExt, stream};
use relay_catalog::{Catalog, CatalogError, ProbeStatus, Provider};
use relay_config::HealthCheckConfig;
use relay_core::{join_url, unix_now};
use secrecy::ExposeSecret;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::registry::ProviderRegistry;

/// Result of a single probe, also returned by the manual test endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A classified probe result plus whether it counts toward the threshold
struct ProbeOutcome {
    report: ProbeReport,
    counts_as_failure: bool,
}

/// The background prober
pub struct HealthProber {
    catalog: Arc<Catalog>,
    registry: ProviderRegistry,
    client: reqwest::Client,
    config: HealthCheckConfig,
}

impl HealthProber {
    pub fn new(catalog: Arc<Catalog>, config: HealthCheckConfig) -> Self {
        Self {
            registry: ProviderRegistry::new(Arc::clone(&catalog)),
            catalog,
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Start the probe loop; it stops promptly when `shutdown` fires
    ///
    /// A catalog change notification triggers an immediate extra cycle so
    /// newly created providers are probed without waiting a full interval.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        let prober = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs_f64(prober.config.interval_seconds));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut changes = prober.catalog.subscribe();

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = interval.tick() => {}
                    changed = changes.changed() => {
                        if changed.is_err() {
                            // Catalog dropped; nothing left to probe
                            break;
                        }
                    }
                }

                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = prober.run_cycle() => {}
                }
            }

            tracing::info!("health prober stopped");
        })
    }

    /// Probe every active provider once, bounded by the configured pool
    pub async fn run_cycle(&self) {
        // Snapshot at cycle start; admin edits during the cycle apply next time
        let providers: Vec<Provider> = self.registry.list_active();

        stream::iter(providers)
            .for_each_concurrent(Some(self.config.max_concurrent), |provider| async move {
                let outcome = self.probe(&provider).await;
                self.apply(&provider, &outcome);
            })
            .await;
    }

    /// Run the probe for one provider on demand and update its live fields
    pub async fn test_provider(&self, id: relay_catalog::ProviderId) -> Result<ProbeReport, GatewayError> {
        let provider = self.catalog.get_provider(id)?;
        let outcome = self.probe(&provider).await;
        self.apply(&provider, &outcome);
        Ok(outcome.report)
    }

    /// Issue one probe request and classify the outcome
    async fn probe(&self, provider: &Provider) -> ProbeOutcome {
        let credential = match self.catalog.decrypt(&provider.api_key_encrypted) {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(provider = %provider.name, error = %e, "skipping probe, credential unusable");
                // Says nothing about the network path, so it never counts
                // toward the unhealthy threshold
                return ProbeOutcome {
                    report: ProbeReport {
                        status: ProbeStatus::Error,
                        http_code: None,
                        latency_ms: None,
                        detail: Some("credential decrypt failed".to_owned()),
                    },
                    counts_as_failure: false,
                };
            }
        };

        let url = join_url(&provider.base_url, "models");
        let timeout = Duration::from_secs_f64(self.config.timeout_seconds);
        let started = Instant::now();

        let report = match self
            .client
            .get(&url)
            .bearer_auth(credential.expose_secret())
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => {
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                let code = response.status().as_u16();
                if response.status().is_success() {
                    ProbeReport {
                        status: ProbeStatus::Online,
                        http_code: Some(code),
                        latency_ms: Some(latency_ms),
                        detail: None,
                    }
                } else {
                    ProbeReport {
                        status: ProbeStatus::Degraded,
                        http_code: Some(code),
                        latency_ms: Some(latency_ms),
                        detail: Some(format!("received status code {code}")),
                    }
                }
            }
            Err(e) if e.is_timeout() => ProbeReport {
                status: ProbeStatus::Timeout,
                http_code: None,
                latency_ms: None,
                detail: Some("probe exceeded timeout".to_owned()),
            },
            Err(e) if e.is_connect() => ProbeReport {
                status: ProbeStatus::Unreachable,
                http_code: None,
                latency_ms: None,
                detail: Some(e.to_string()),
            },
            Err(e) => ProbeReport {
                status: ProbeStatus::Error,
                http_code: None,
                latency_ms: None,
                detail: Some(e.to_string()),
            },
        };

        ProbeOutcome {
            report,
            counts_as_failure: true,
        }
    }

    /// Fold a probe outcome into the provider's live health fields
    fn apply(&self, provider: &Provider, outcome: &ProbeOutcome) {
        let threshold = self.config.failure_threshold;
        let report = &outcome.report;

        let result: Result<_, CatalogError> = self.catalog.update_live(provider.id, |health| {
            health.last_status = report.status;
            health.last_latency_ms = report.latency_ms;
            health.last_probed_at = Some(unix_now());

            if report.status == ProbeStatus::Online {
                health.consecutive_failures = 0;
                health.healthy = true;
            } else if outcome.counts_as_failure {
                health.consecutive_failures += 1;
                health.healthy = health.consecutive_failures < threshold;
            }
        });

        match result {
            Ok(health) => {
                if !health.healthy {
                    tracing::warn!(
                        provider = %provider.name,
                        status = ?report.status,
                        consecutive_failures = health.consecutive_failures,
                        "provider is unhealthy"
                    );
                } else {
                    tracing::debug!(
                        provider = %provider.name,
                        status = ?report.status,
                        latency_ms = ?report.latency_ms,
                        "probe completed"
                    );
                }
            }
            Err(e) => {
                // Provider was deleted mid-cycle
                tracing::debug!(provider = %provider.name, error = %e, "discarding probe result");
            }
        }
    }
}
