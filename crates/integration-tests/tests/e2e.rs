//! End-to-end tests for the canonical chat endpoint and admin surface

mod harness;

use harness::config::ConfigBuilder;
use harness::mock_provider::MockProvider;
use harness::server::TestServer;

fn completion_body(model: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": "Hello"}]
    })
}

fn auto_route(name: &str, models: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "mode": "auto",
        "provider_mode": "all",
        "selected_models": models,
    })
}

#[tokio::test]
async fn completion_via_named_route() {
    let provider = MockProvider::openai().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    server
        .create_provider("mock", &provider.base_url(), &["mock-model-1"])
        .await;
    server.create_route(auto_route("default", &["mock-model-1"])).await;

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("default"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "Hello from mock provider");
    assert_eq!(json["model"], "mock-model-1");
    assert_eq!(provider.completion_count(), 1);
}

#[tokio::test]
async fn echoed_content_survives_translation_roundtrip() {
    let provider = MockProvider::openai_echo().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    server
        .create_provider("mock", &provider.base_url(), &["mock-model-1"])
        .await;
    server.create_route(auto_route("default", &["mock-model-1"])).await;

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&serde_json::json!({
            "model": "default",
            "messages": [
                {"role": "system", "content": "be helpful"},
                {"role": "user", "content": "first question"},
                {"role": "assistant", "content": "first answer"},
                {"role": "user", "content": "repeat after me"}
            ]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "repeat after me");
    assert_eq!(json["object"], "chat.completion");
}

#[tokio::test]
async fn model_name_falls_back_to_auto_route_with_hint() {
    let provider = MockProvider::openai().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    server
        .create_provider("mock", &provider.base_url(), &["mock-model-1", "mock-model-2"])
        .await;
    server.create_route(auto_route("default", &[])).await;

    // "mock-model-2" is a declared model, not a route name; the fallback
    // route catches it and the hint overrides rotation
    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("mock-model-2"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["model"], "mock-model-2");
}

#[tokio::test]
async fn unknown_route_without_fallback_is_unavailable() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("nothing-here"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "no_provider_available");
}

#[tokio::test]
async fn inactive_route_is_not_found() {
    let provider = MockProvider::openai().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    server
        .create_provider("mock", &provider.base_url(), &["mock-model-1"])
        .await;
    server
        .create_route(serde_json::json!({
            "name": "disabled",
            "active": false,
            "mode": "auto",
            "provider_mode": "all",
            "selected_models": ["mock-model-1"],
        }))
        .await;

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("disabled"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn models_endpoint_lists_active_routes() {
    let provider = MockProvider::openai().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    server
        .create_provider("mock", &provider.base_url(), &["mock-model-1"])
        .await;
    server.create_route(auto_route("default", &["mock-model-1"])).await;

    let resp = server.client().get(server.url("/v1/models")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["object"], "list");
    assert_eq!(json["data"][0]["id"], "default");
}

#[tokio::test]
async fn admin_masks_api_keys() {
    let provider = MockProvider::openai().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    server
        .create_provider("mock", &provider.base_url(), &["mock-model-1"])
        .await;

    let resp = server.client().get(server.url("/api/providers")).send().await.unwrap();
    let json: serde_json::Value = resp.json().await.unwrap();

    let masked = json[0]["api_key_masked"].as_str().unwrap();
    assert!(masked.contains("***"));
    assert_ne!(masked, "sk-mock-key");
    assert!(json[0].get("api_key_encrypted").is_none());
}

#[tokio::test]
async fn selection_debug_endpoint_reports_pick() {
    let provider = MockProvider::openai().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let provider_id = server
        .create_provider("mock", &provider.base_url(), &["mock-model-1"])
        .await;
    let route_id = server.create_route(auto_route("default", &["mock-model-1"])).await;

    let resp = server
        .client()
        .post(server.url(&format!("/api/routes/{route_id}/select")))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["provider_id"].as_u64().unwrap(), provider_id);
    assert_eq!(json["provider_name"], "mock");
    assert_eq!(json["model"], "mock-model-1");
}

#[tokio::test]
async fn healthz_responds() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();
    let resp = server.client().get(server.url("/healthz")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}
