use serde::{Deserialize, Serialize};

use super::message::ChatMessage;

/// Canonical chat-completion request
///
/// `model` names a route on the way in; dispatch rewrites it to the chosen
/// provider model before translation. Unknown fields are preserved in
/// `extra` and forwarded verbatim to OpenAI-compatible providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
