//! Test server wrapper that starts the gateway on a random port

use std::net::SocketAddr;

use relay_config::Config;
use relay_server::Server;
use tokio_util::sync::CancellationToken;

/// A running gateway instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
}

impl TestServer {
    /// Start a gateway with the given configuration on port 0
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let server = Server::new(config)?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            axum::serve(listener, server.into_router())
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            shutdown,
            client: reqwest::Client::new(),
        })
    }

    /// Full URL for a path on the gateway
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Register a provider through the admin API, returning its id
    pub async fn create_provider(&self, name: &str, base_url: &str, models: &[&str]) -> u64 {
        let response = self
            .client
            .post(self.url("/api/providers"))
            .json(&serde_json::json!({
                "name": name,
                "base_url": base_url,
                "api_key": "sk-mock-key",
                "models": models,
            }))
            .send()
            .await
            .expect("provider create request failed");
        assert_eq!(response.status(), 201, "provider create rejected");

        let body: serde_json::Value = response.json().await.unwrap();
        body["id"].as_u64().unwrap()
    }

    /// Create a route through the admin API, returning its id
    pub async fn create_route(&self, body: serde_json::Value) -> u64 {
        let response = self
            .client
            .post(self.url("/api/routes"))
            .json(&body)
            .send()
            .await
            .expect("route create request failed");
        assert_eq!(response.status(), 201, "route create rejected");

        let body: serde_json::Value = response.json().await.unwrap();
        body["id"].as_u64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
