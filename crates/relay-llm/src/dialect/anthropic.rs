//! Anthropic Messages dialect
//!
//! Leading system messages are promoted to the top-level `system`
//! parameter, the content block array is flattened to a single string, and
//! the event-stream dialect is converted to canonical delta chunks.

use super::{ChunkStream, Dialect, DialectAdapter, RequestAuth, sse_chunk_stream};
use crate::error::GatewayError;
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicStreamDelta,
    AnthropicStreamEvent, AnthropicUsage,
};
use crate::types::{ChatRequest, ChatResponse, Choice, ChoiceMessage, FinishReason, StreamChunk, StreamContext, Usage};

/// The Messages API requires `max_tokens`; used when the client omits it
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Pinned API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter;

impl DialectAdapter for AnthropicAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Anthropic
    }

    fn endpoint_path(&self, _model: &str, _stream: bool) -> String {
        "v1/messages".to_owned()
    }

    fn auth(&self, credential: &str) -> RequestAuth {
        RequestAuth::Headers(vec![
            ("authorization", format!("Bearer {credential}")),
            ("anthropic-version", ANTHROPIC_VERSION.to_owned()),
        ])
    }

    fn translate_request(&self, request: &ChatRequest, model: &str) -> Result<serde_json::Value, GatewayError> {
        let mut system_parts: Vec<String> = Vec::new();
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for msg in &request.messages {
            let role = match msg.role {
                // Leading system messages become the system parameter; a
                // system message after the conversation started has no
                // Anthropic equivalent and is carried as a user turn
                crate::types::Role::System if messages.is_empty() => {
                    system_parts.push(msg.content.clone());
                    continue;
                }
                crate::types::Role::System | crate::types::Role::User => "user",
                crate::types::Role::Assistant => "assistant",
            };
            messages.push(AnthropicMessage {
                role: role.to_owned(),
                content: msg.content.clone(),
            });
        }

        let wire = AnthropicRequest {
            model: model.to_owned(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages,
            temperature: request.temperature,
            stream: request.stream.then_some(true),
        };

        serde_json::to_value(wire).map_err(|e| GatewayError::Adapter(format!("request serialization failed: {e}")))
    }

    fn translate_response(&self, body: serde_json::Value, ctx: &StreamContext) -> Result<ChatResponse, GatewayError> {
        let wire: AnthropicResponse =
            serde_json::from_value(body).map_err(|e| GatewayError::Adapter(format!("unexpected response shape: {e}")))?;

        let mut content = String::new();
        for block in &wire.content {
            let AnthropicContentBlock::Text { text } = block;
            content.push_str(text);
        }

        let finish_reason = wire.stop_reason.as_deref().and_then(map_stop_reason);

        Ok(ChatResponse {
            id: ctx.id.clone(),
            object: "chat.completion".to_owned(),
            created: ctx.created,
            model: ctx.model.clone(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage::assistant(content),
                finish_reason,
            }],
            usage: Some(convert_usage(wire.usage)),
        })
    }

    fn stream_chunks(&self, response: reqwest::Response, ctx: StreamContext) -> ChunkStream {
        let mut state = AnthropicStreamState::new(ctx);
        sse_chunk_stream(response, move |data| state.convert(data))
    }
}

/// Map an Anthropic stop reason onto the canonical finish reason
fn map_stop_reason(reason: &str) -> Option<FinishReason> {
    match reason {
        "end_turn" | "stop_sequence" => Some(FinishReason::Stop),
        "max_tokens" => Some(FinishReason::Length),
        _ => None,
    }
}

fn convert_usage(usage: AnthropicUsage) -> Usage {
    Usage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.input_tokens + usage.output_tokens,
    }
}

/// Stateful conversion of Anthropic stream events to canonical chunks
///
/// `message_delta` may arrive with usage but no stop reason; the usage is
/// held back and attached to the terminal chunk.
struct AnthropicStreamState {
    ctx: StreamContext,
    finish_emitted: bool,
    pending_usage: Option<Usage>,
}

impl AnthropicStreamState {
    fn new(ctx: StreamContext) -> Self {
        Self {
            ctx,
            finish_emitted: false,
            pending_usage: None,
        }
    }

    fn convert(&mut self, data: &str) -> Vec<Result<StreamChunk, GatewayError>> {
        let event = match serde_json::from_str::<AnthropicStreamEvent>(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable Anthropic SSE event");
                return Vec::new();
            }
        };

        match event {
            AnthropicStreamEvent::MessageStart => vec![Ok(StreamChunk::role(&self.ctx))],

            AnthropicStreamEvent::ContentBlockDelta {
                delta: AnthropicStreamDelta::TextDelta { text },
                ..
            } => vec![Ok(StreamChunk::content(&self.ctx, text))],

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let usage = usage.map(convert_usage);
                match delta.stop_reason.as_deref().and_then(map_stop_reason) {
                    Some(reason) => {
                        self.finish_emitted = true;
                        let usage = usage.or(self.pending_usage.take());
                        vec![Ok(StreamChunk::finish(&self.ctx, reason, usage))]
                    }
                    None => {
                        self.pending_usage = usage.or(self.pending_usage.take());
                        Vec::new()
                    }
                }
            }

            AnthropicStreamEvent::MessageStop => {
                if self.finish_emitted {
                    Vec::new()
                } else {
                    self.finish_emitted = true;
                    vec![Ok(StreamChunk::finish(
                        &self.ctx,
                        FinishReason::Stop,
                        self.pending_usage.take(),
                    ))]
                }
            }

            AnthropicStreamEvent::ContentBlockStart { .. }
            | AnthropicStreamEvent::ContentBlockStop { .. }
            | AnthropicStreamEvent::Ping => Vec::new(),
        }
    }
}
