//! Mock upstream providers for integration tests
//!
//! Serves just enough of each dialect to exercise the gateway: a models
//! endpoint for probes, an OpenAI-shaped chat endpoint with canned,
//! failing, and streaming behaviors, and an Anthropic-shaped messages
//! endpoint replaying configured SSE events.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// A running mock provider
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    completion_count: AtomicU32,
    probe_count: AtomicU32,
    /// Completions failing with 500 before succeeding
    fail_completions: AtomicU32,
    /// Probes failing with 500 before succeeding
    fail_probes: AtomicU32,
    /// Fixed status returned by the chat endpoint, overriding everything
    fixed_status: Option<u16>,
    /// Echo the last user message instead of the canned content
    echo: bool,
    response_content: String,
    /// SSE data records replayed by the Anthropic messages endpoint
    anthropic_events: Vec<String>,
}

impl MockProvider {
    /// OpenAI-compatible mock with the default canned response
    pub async fn openai() -> anyhow::Result<Self> {
        Self::start(MockState::new()).await
    }

    /// OpenAI-compatible mock with a custom response
    pub async fn openai_with_response(content: &str) -> anyhow::Result<Self> {
        let mut state = MockState::new();
        state.response_content = content.to_owned();
        Self::start(state).await
    }

    /// Mock that echoes the last user message back as the completion
    pub async fn openai_echo() -> anyhow::Result<Self> {
        let mut state = MockState::new();
        state.echo = true;
        Self::start(state).await
    }

    /// Mock whose chat endpoint fails the first `n` requests with 500
    pub async fn openai_failing(n: u32) -> anyhow::Result<Self> {
        let mut state = MockState::new();
        state.fail_completions = AtomicU32::new(n);
        Self::start(state).await
    }

    /// Mock whose chat endpoint always fails with 500
    pub async fn openai_always_failing() -> anyhow::Result<Self> {
        Self::openai_failing(u32::MAX).await
    }

    /// Mock whose chat endpoint always answers with the given status
    pub async fn openai_status(status: u16) -> anyhow::Result<Self> {
        let mut state = MockState::new();
        state.fixed_status = Some(status);
        Self::start(state).await
    }

    /// Mock whose probe endpoint fails the first `n` requests with 500
    pub async fn probes_failing(n: u32) -> anyhow::Result<Self> {
        let mut state = MockState::new();
        state.fail_probes = AtomicU32::new(n);
        Self::start(state).await
    }

    /// Anthropic-dialect mock streaming the given SSE data records
    pub async fn anthropic_streaming(events: &[&str]) -> anyhow::Result<Self> {
        let mut state = MockState::new();
        state.anthropic_events = events.iter().map(|e| (*e).to_owned()).collect();
        Self::start(state).await
    }

    async fn start(state: MockState) -> anyhow::Result<Self> {
        let state = Arc::new(state);

        let app = Router::new()
            .route("/models", routing::get(handle_models))
            .route("/chat/completions", routing::post(handle_chat))
            .route("/v1/messages", routing::post(handle_messages))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for registering the mock as a provider
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of chat requests received
    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }

    /// Number of probe requests received
    pub fn probe_count(&self) -> u32 {
        self.state.probe_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl MockState {
    fn new() -> Self {
        Self {
            completion_count: AtomicU32::new(0),
            probe_count: AtomicU32::new(0),
            fail_completions: AtomicU32::new(0),
            fail_probes: AtomicU32::new(0),
            fixed_status: None,
            echo: false,
            response_content: "Hello from mock provider".to_owned(),
            anthropic_events: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequestBody {
    model: String,
    messages: Vec<serde_json::Value>,
    #[serde(default)]
    stream: bool,
}

async fn handle_models(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.probe_count.fetch_add(1, Ordering::Relaxed);

    if state.fail_probes.load(Ordering::Relaxed) > 0 {
        state.fail_probes.fetch_sub(1, Ordering::Relaxed);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    Json(serde_json::json!({
        "object": "list",
        "data": [{"id": "mock-model-1", "object": "model", "created": 1_700_000_000, "owned_by": "mock"}]
    }))
    .into_response()
}

async fn handle_chat(State(state): State<Arc<MockState>>, Json(request): Json<ChatRequestBody>) -> impl IntoResponse {
    state.completion_count.fetch_add(1, Ordering::Relaxed);

    if let Some(status) = state.fixed_status {
        return (
            StatusCode::from_u16(status).unwrap(),
            Json(serde_json::json!({
                "error": {"message": "mock fixed status", "type": "mock_error"}
            })),
        )
            .into_response();
    }

    if state.fail_completions.load(Ordering::Relaxed) > 0 {
        state.fail_completions.fetch_sub(1, Ordering::Relaxed);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": {"message": "mock intentional failure", "type": "server_error"}
            })),
        )
            .into_response();
    }

    if request.stream {
        return streaming_chat_body(&state, &request.model).into_response();
    }

    let content = if state.echo {
        request
            .messages
            .iter()
            .rev()
            .find(|m| m["role"] == "user")
            .and_then(|m| m["content"].as_str())
            .unwrap_or_default()
            .to_owned()
    } else {
        state.response_content.clone()
    };

    Json(serde_json::json!({
        "id": "chatcmpl-mock-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": request.model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .into_response()
}

/// OpenAI-style SSE body: role chunk, one chunk per word, finish, `[DONE]`
fn streaming_chat_body(state: &MockState, model: &str) -> impl IntoResponse {
    let mut body = String::new();

    let chunk = |delta: serde_json::Value, finish: serde_json::Value| {
        serde_json::json!({
            "id": "chatcmpl-mock-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish}]
        })
        .to_string()
    };

    body.push_str(&format!(
        "data: {}\n\n",
        chunk(serde_json::json!({"role": "assistant"}), serde_json::Value::Null)
    ));
    for word in state.response_content.split_whitespace() {
        body.push_str(&format!(
            "data: {}\n\n",
            chunk(serde_json::json!({"content": format!("{word} ")}), serde_json::Value::Null)
        ));
    }
    body.push_str(&format!(
        "data: {}\n\n",
        chunk(serde_json::json!({}), serde_json::json!("stop"))
    ));
    body.push_str("data: [DONE]\n\n");

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
}

/// Anthropic messages endpoint replaying the configured event records
async fn handle_messages(State(state): State<Arc<MockState>>, Json(request): Json<serde_json::Value>) -> impl IntoResponse {
    state.completion_count.fetch_add(1, Ordering::Relaxed);

    if request["stream"].as_bool().unwrap_or(false) {
        let mut body = String::new();
        for event in &state.anthropic_events {
            body.push_str(&format!("data: {event}\n\n"));
        }
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/event-stream")],
            body,
        )
            .into_response();
    }

    Json(serde_json::json!({
        "id": "msg_mock_1",
        "type": "message",
        "role": "assistant",
        "model": request["model"],
        "content": [{"type": "text", "text": state.response_content}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 5}
    }))
    .into_response()
}
