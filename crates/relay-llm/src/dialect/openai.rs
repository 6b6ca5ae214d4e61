//! OpenAI-compatible dialect
//!
//! The canonical shape is this wire format, so translation is identity:
//! rewrite the model field, forward passthrough extras, and reframe the
//! provider's SSE records without touching their content.

use super::{ChunkStream, Dialect, DialectAdapter, RequestAuth, sse_chunk_stream};
use crate::error::GatewayError;
use crate::types::{ChatRequest, ChatResponse, StreamChunk, StreamContext};

pub struct OpenAiAdapter;

impl DialectAdapter for OpenAiAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::OpenAi
    }

    fn endpoint_path(&self, _model: &str, _stream: bool) -> String {
        "chat/completions".to_owned()
    }

    fn auth(&self, credential: &str) -> RequestAuth {
        RequestAuth::Headers(vec![("authorization", format!("Bearer {credential}"))])
    }

    fn translate_request(&self, request: &ChatRequest, model: &str) -> Result<serde_json::Value, GatewayError> {
        let mut wire = request.clone();
        wire.model = model.to_owned();
        serde_json::to_value(wire).map_err(|e| GatewayError::Adapter(format!("request serialization failed: {e}")))
    }

    fn translate_response(&self, body: serde_json::Value, _ctx: &StreamContext) -> Result<ChatResponse, GatewayError> {
        serde_json::from_value(body).map_err(|e| GatewayError::Adapter(format!("unexpected response shape: {e}")))
    }

    fn stream_chunks(&self, response: reqwest::Response, _ctx: StreamContext) -> ChunkStream {
        sse_chunk_stream(response, |data| match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => vec![Ok(chunk)],
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable upstream chunk");
                Vec::new()
            }
        })
    }
}
