//! Provider dialect adapters
//!
//! One trait, three implementations. An adapter owns everything that is
//! specific to a provider's wire protocol: the endpoint path, the
//! authentication scheme, request/response translation, and streaming
//! conversion. Dialect selection is a pure function of provider attributes.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt, stream};

use crate::error::GatewayError;
use crate::types::{ChatRequest, ChatResponse, StreamChunk, StreamContext};

/// Wire protocol flavor of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// OpenAI-compatible chat completions (the default)
    OpenAi,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Gemini,
}

/// Authentication material for an upstream request
#[derive(Debug, Clone)]
pub enum RequestAuth {
    /// Header name/value pairs attached to the request
    Headers(Vec<(&'static str, String)>),
    /// Credential passed as a query-string parameter
    Query { key: &'static str, value: String },
}

/// Lazy stream of canonical chunks; dropping it closes the upstream connection
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>>;

/// Capability set every provider dialect implements
pub trait DialectAdapter: Send + Sync {
    /// Which dialect this adapter speaks
    fn dialect(&self) -> Dialect;

    /// Endpoint path appended to the provider base URL
    fn endpoint_path(&self, model: &str, stream: bool) -> String;

    /// Authentication derived from the decrypted credential
    fn auth(&self, credential: &str) -> RequestAuth;

    /// Canonical request → provider request body
    fn translate_request(&self, request: &ChatRequest, model: &str) -> Result<serde_json::Value, GatewayError>;

    /// Provider response body → canonical response
    fn translate_response(&self, body: serde_json::Value, ctx: &StreamContext) -> Result<ChatResponse, GatewayError>;

    /// Provider byte stream → canonical chunk stream
    fn stream_chunks(&self, response: reqwest::Response, ctx: StreamContext) -> ChunkStream;
}

/// Detect a provider's dialect from its name and base URL
pub fn detect_dialect(name: &str, base_url: &str) -> Dialect {
    let name = name.to_lowercase();
    let url = base_url.to_lowercase();

    if name.contains("anthropic") || name.contains("claude") || url.contains("anthropic.com") {
        Dialect::Anthropic
    } else if name.contains("gemini") || name.contains("google") || url.contains("googleapis.com") {
        Dialect::Gemini
    } else {
        Dialect::OpenAi
    }
}

/// The adapter instance for a dialect
pub fn adapter_for(dialect: Dialect) -> &'static dyn DialectAdapter {
    match dialect {
        Dialect::OpenAi => &openai::OpenAiAdapter,
        Dialect::Anthropic => &anthropic::AnthropicAdapter,
        Dialect::Gemini => &gemini::GeminiAdapter,
    }
}

/// Reframe an upstream SSE body into canonical chunks
///
/// `convert` turns one SSE data record into zero or more chunks; transport
/// errors surface as a single in-band error item. The upstream `[DONE]`
/// sentinel ends the stream; the handler writes its own terminator. Only
/// the record currently being converted is held in memory.
pub(crate) fn sse_chunk_stream<F>(response: reqwest::Response, mut convert: F) -> ChunkStream
where
    F: FnMut(&str) -> Vec<Result<StreamChunk, GatewayError>> + Send + 'static,
{
    let events = response
        .bytes_stream()
        .eventsource()
        .take_while(|result| {
            let done = matches!(result, Ok(event) if event.data.trim() == "[DONE]");
            std::future::ready(!done)
        })
        .flat_map(move |result| {
            let items = match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() { Vec::new() } else { convert(data) }
                }
                Err(e) => vec![Err(GatewayError::UpstreamUnreachable { detail: e.to_string() })],
            };
            stream::iter(items)
        });

    Box::pin(events)
}
