//! Axum handlers for the canonical chat endpoint

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt, stream};
use relay_core::{HttpError, unix_now};
use serde::Serialize;

use crate::dialect::ChunkStream;
use crate::error::GatewayError;
use crate::state::GatewayState;
use crate::types::ChatRequest;

/// Build the router for the canonical endpoints
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .route("/v1/models", routing::get(list_models))
        .with_state(state)
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(State(state): State<GatewayState>, Json(request): Json<ChatRequest>) -> Response {
    if request.stream {
        match state.complete_stream(request).await {
            Ok((_model, chunks)) => sse_response(chunks).into_response(),
            Err(e) => error_response(&e),
        }
    } else {
        match state.complete(request).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

/// Active routes presented as OpenAI model entries
#[derive(Serialize)]
struct ModelEntry {
    id: String,
    object: String,
    created: u64,
    owned_by: String,
}

#[derive(Serialize)]
struct ModelList {
    object: String,
    data: Vec<ModelEntry>,
}

/// Handle `GET /v1/models`: clients discover route names here
async fn list_models(State(state): State<GatewayState>) -> Response {
    let now = unix_now();
    let data = state
        .catalog()
        .list_routes()
        .into_iter()
        .filter(|route| route.active)
        .map(|route| ModelEntry {
            id: route.name,
            object: "model".to_owned(),
            created: now,
            owned_by: "relay".to_owned(),
        })
        .collect();

    Json(ModelList {
        object: "list".to_owned(),
        data,
    })
    .into_response()
}

/// Frame canonical chunks as server-sent events
///
/// Each chunk becomes one `data:` frame. A mid-stream error is reported
/// in-band as a single error frame, and the stream always ends with the
/// `[DONE]` sentinel.
fn sse_response(chunks: ChunkStream) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = chunks
        .scan(false, |errored, item| {
            if *errored {
                return std::future::ready(None);
            }
            let event = match item {
                Ok(chunk) => Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()),
                Err(e) => {
                    *errored = true;
                    let payload = serde_json::json!({
                        "error": {
                            "message": e.client_message(),
                            "type": e.error_type(),
                            "code": serde_json::Value::Null,
                        }
                    });
                    Event::default().data(payload.to_string())
                }
            };
            std::future::ready(Some(Ok::<_, axum::Error>(event)))
        })
        .chain(stream::once(std::future::ready(Ok(Event::default().data("[DONE]")))));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Convert a gateway error to the client-visible JSON error shape
pub fn error_response(error: &GatewayError) -> Response {
    let status = error.status_code();
    let body = serde_json::json!({
        "error": {
            "message": error.client_message(),
            "type": error.error_type(),
            "code": serde_json::Value::Null,
        }
    });

    (status, Json(body)).into_response()
}
