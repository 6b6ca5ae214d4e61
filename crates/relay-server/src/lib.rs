//! Server assembly for the relay gateway

mod admin;
mod health;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use relay_catalog::Catalog;
use relay_config::Config;
use relay_llm::GatewayState;
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    prober_shutdown: CancellationToken,
}

impl Server {
    /// Build the server from configuration and start the background prober
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let catalog = Arc::new(Catalog::open(
            config.catalog.path.clone(),
            config.catalog.secret.expose_secret(),
        )?);

        let state = GatewayState::new(catalog, config.health, config.dispatch);

        let prober_shutdown = CancellationToken::new();
        state.spawn_prober(prober_shutdown.clone());

        let router = Router::new()
            .route("/healthz", axum::routing::get(health::health_handler))
            .merge(relay_llm::gateway_router(state.clone()))
            .merge(admin::admin_router(state))
            .layer(TraceLayer::new_for_http());

        Ok(Self {
            router,
            listen_address,
            prober_shutdown,
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener. The prober
    /// keeps running until the returned token owner cancels it.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered; the prober stops
    /// with the server.
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "relay listening");

        let prober_shutdown = self.prober_shutdown;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        prober_shutdown.cancel();
        Ok(())
    }
}
