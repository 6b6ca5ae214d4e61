//! Health probing, thresholds, and health-driven selection

mod harness;

use std::time::Duration;

use harness::config::ConfigBuilder;
use harness::mock_provider::MockProvider;
use harness::server::TestServer;

fn auto_route(models: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "name": "pool",
        "mode": "auto",
        "provider_mode": "all",
        "selected_models": models,
    })
}

async fn provider_health(server: &TestServer, id: u64) -> serde_json::Value {
    let resp = server
        .client()
        .get(server.url(&format!("/api/providers/{id}")))
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = resp.json().await.unwrap();
    json["health"].clone()
}

#[tokio::test]
async fn manual_probe_reports_and_counts_failures() {
    // /models fails three times, then recovers
    let provider = MockProvider::probes_failing(3).await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_failure_threshold(3).build())
        .await
        .unwrap();
    let id = server
        .create_provider("mock", &provider.base_url(), &["mock-model-1"])
        .await;

    for expected_failures in 1..=3u32 {
        let resp = server
            .client()
            .post(server.url(&format!("/api/providers/{id}/test")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let report: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(report["status"], "degraded");
        assert_eq!(report["http_code"], 500);

        let health = provider_health(&server, id).await;
        assert_eq!(health["consecutive_failures"].as_u64().unwrap(), u64::from(expected_failures));
    }

    // Threshold reached
    let health = provider_health(&server, id).await;
    assert_eq!(health["healthy"], false);

    // One successful probe restores health and zeroes the counter
    let resp = server
        .client()
        .post(server.url(&format!("/api/providers/{id}/test")))
        .send()
        .await
        .unwrap();
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["status"], "online");

    let health = provider_health(&server, id).await;
    assert_eq!(health["healthy"], true);
    assert_eq!(health["consecutive_failures"], 0);
    assert_eq!(health["last_status"], "online");
}

#[tokio::test]
async fn unreachable_provider_is_classified() {
    // Nothing listens on this port
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();
    let id = server.create_provider("ghost", "http://127.0.0.1:9", &["m"]).await;

    let resp = server
        .client()
        .post(server.url(&format!("/api/providers/{id}/test")))
        .send()
        .await
        .unwrap();
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["status"], "unreachable");
}

#[tokio::test]
async fn unhealthy_provider_is_skipped_by_selection() {
    let p1 = MockProvider::openai().await.unwrap();
    let p2 = MockProvider::openai().await.unwrap();

    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();
    let p1_id = server.create_provider("p1", &p1.base_url(), &["m"]).await;
    let p2_id = server.create_provider("p2", &p2.base_url(), &["m"]).await;
    let route_id = server.create_route(auto_route(&["m"])).await;

    // Force p1 unhealthy through the admin override
    let resp = server
        .client()
        .put(server.url(&format!("/api/providers/{p1_id}/health")))
        .json(&serde_json::json!({"healthy": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    for _ in 0..2 {
        let resp = server
            .client()
            .post(server.url(&format!("/api/routes/{route_id}/select")))
            .send()
            .await
            .unwrap();
        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["provider_id"].as_u64().unwrap(), p2_id);
    }
}

#[tokio::test]
async fn background_prober_marks_providers_online() {
    let provider = MockProvider::openai().await.unwrap();

    let server = TestServer::start(ConfigBuilder::new().with_health_interval(0.2).build())
        .await
        .unwrap();
    let id = server
        .create_provider("mock", &provider.base_url(), &["mock-model-1"])
        .await;

    // The catalog change notification triggers a probe cycle promptly
    let mut probed = false;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let health = provider_health(&server, id).await;
        if health["last_status"] == "online" {
            assert_eq!(health["healthy"], true);
            assert!(health["last_probed_at"].as_u64().is_some());
            assert!(health["last_latency_ms"].as_f64().is_some());
            probed = true;
            break;
        }
    }

    assert!(probed, "prober never probed the provider");
    assert!(provider.probe_count() >= 1);
}
