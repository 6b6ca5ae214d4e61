//! Gemini dialect
//!
//! Messages map to `contents` with user/model roles, system messages fold
//! into `systemInstruction`, and the credential travels as a query-string
//! key. Streaming uses the SSE variant of `streamGenerateContent`.

use super::{ChunkStream, Dialect, DialectAdapter, RequestAuth, sse_chunk_stream};
use crate::error::GatewayError;
use crate::protocol::gemini::{
    GeminiContent, GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiResponse, GeminiUsageMetadata,
};
use crate::types::{ChatRequest, ChatResponse, Choice, ChoiceMessage, FinishReason, Role, StreamChunk, StreamContext, Usage};

pub struct GeminiAdapter;

impl DialectAdapter for GeminiAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Gemini
    }

    fn endpoint_path(&self, model: &str, stream: bool) -> String {
        if stream {
            format!("v1/models/{model}:streamGenerateContent?alt=sse")
        } else {
            format!("v1/models/{model}:generateContent")
        }
    }

    fn auth(&self, credential: &str) -> RequestAuth {
        RequestAuth::Query {
            key: "key",
            value: credential.to_owned(),
        }
    }

    fn translate_request(&self, request: &ChatRequest, _model: &str) -> Result<serde_json::Value, GatewayError> {
        let mut system_parts: Vec<String> = Vec::new();
        let mut contents: Vec<GeminiContent> = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.clone()),
                Role::User | Role::Assistant => {
                    let role = if msg.role == Role::Assistant { "model" } else { "user" };
                    contents.push(GeminiContent {
                        role: Some(role.to_owned()),
                        parts: vec![GeminiPart {
                            text: msg.content.clone(),
                        }],
                    });
                }
            }
        }

        let generation_config = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            })
        } else {
            None
        };

        let wire = GeminiRequest {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(GeminiContent {
                    role: None,
                    parts: vec![GeminiPart {
                        text: system_parts.join("\n\n"),
                    }],
                })
            },
            generation_config,
        };

        serde_json::to_value(wire).map_err(|e| GatewayError::Adapter(format!("request serialization failed: {e}")))
    }

    fn translate_response(&self, body: serde_json::Value, ctx: &StreamContext) -> Result<ChatResponse, GatewayError> {
        let wire: GeminiResponse =
            serde_json::from_value(body).map_err(|e| GatewayError::Adapter(format!("unexpected response shape: {e}")))?;

        let candidate = wire
            .candidates
            .first()
            .ok_or_else(|| GatewayError::Adapter("response carried no candidates".to_owned()))?;

        let content = candidate_text(candidate.content.as_ref());
        let finish_reason = candidate.finish_reason.as_deref().map(map_finish_reason);

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
            usage: wire.usage_metadata.map(convert_usage),
        })
    }

    fn stream_chunks(&self, response: reqwest::Response, ctx: StreamContext) -> ChunkStream {
        let mut state = GeminiStreamState::new(ctx);
        sse_chunk_stream(response, move |data| state.convert(data))
    }
}

/// Map a Gemini finish reason onto the canonical finish reason
fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

fn convert_usage(metadata: GeminiUsageMetadata) -> Usage {
    Usage {
        prompt_tokens: metadata.prompt_token_count,
        completion_tokens: metadata.candidates_token_count,
        total_tokens: metadata.total_token_count,
    }
}

fn candidate_text(content: Option<&GeminiContent>) -> String {
    content.map_or_else(String::new, |c| {
        c.parts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("")
    })
}

/// Stateful conversion of Gemini stream responses to canonical chunks
struct GeminiStreamState {
    ctx: StreamContext,
    started: bool,
}

impl GeminiStreamState {
    fn new(ctx: StreamContext) -> Self {
        Self { ctx, started: false }
    }

    fn convert(&mut self, data: &str) -> Vec<Result<StreamChunk, GatewayError>> {
        let chunk = match serde_json::from_str::<GeminiResponse>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable Gemini SSE chunk");
                return Vec::new();
            }
        };

        let Some(candidate) = chunk.candidates.first() else {
            return Vec::new();
        };

        let mut out = Vec::new();

        if !self.started {
            self.started = true;
            out.push(Ok(StreamChunk::role(&self.ctx)));
        }

        let text = candidate_text(candidate.content.as_ref());
        if !text.is_empty() {
            out.push(Ok(StreamChunk::content(&self.ctx, text)));
        }

        if let Some(reason) = candidate.finish_reason.as_deref() {
            out.push(Ok(StreamChunk::finish(
                &self.ctx,
                map_finish_reason(reason),
                chunk.usage_metadata.map(convert_usage),
            )));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    fn ctx() -> StreamContext {
        StreamContext {
            id: "chatcmpl-test".to_owned(),
            model: "gemini-test".to_owned(),
            created: 1_700_000_000,
        }
    }

    #[test]
    fn request_maps_roles_and_system_instruction() {
        let request = ChatRequest {
            model: "route".to_owned(),
            messages: vec![
                ChatMessage::new(Role::System, "be terse"),
                ChatMessage::new(Role::User, "hi"),
                ChatMessage::new(Role::Assistant, "hello"),
            ],
            temperature: Some(0.7),
            max_tokens: Some(128),
            stream: false,
            extra: serde_json::Map::new(),
        };

        let body = GeminiAdapter.translate_request(&request, "gemini-test").unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 128);
        assert_eq!(body["generationConfig"]["temperature"], 0.7);
    }

    #[test]
    fn response_concatenates_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hel"}, {"text": "lo"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 1, "totalTokenCount": 4}
        });

        let response = GeminiAdapter.translate_response(body, &ctx()).unwrap();
        assert_eq!(response.choices[0].message.content, "Hello");
        assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total_tokens, 4);
    }

    #[test]
    fn safety_maps_to_content_filter() {
        assert_eq!(map_finish_reason("SAFETY"), FinishReason::ContentFilter);
        assert_eq!(map_finish_reason("RECITATION"), FinishReason::ContentFilter);
        assert_eq!(map_finish_reason("MAX_TOKENS"), FinishReason::Length);
        assert_eq!(map_finish_reason("STOP"), FinishReason::Stop);
    }

    #[test]
    fn empty_candidates_is_adapter_error() {
        let err = GeminiAdapter
            .translate_response(serde_json::json!({"candidates": []}), &ctx())
            .unwrap_err();
        assert!(matches!(err, GatewayError::Adapter(_)));
    }

    #[test]
    fn stream_emits_role_then_content_then_finish() {
        let mut state = GeminiStreamState::new(ctx());

        let first = state.convert(r#"{"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].as_ref().unwrap().choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(first[1].as_ref().unwrap().choices[0].delta.content.as_deref(), Some("Hi"));

        let last = state.convert(r#"{"candidates":[{"content":{"parts":[{"text":"!"}]},"finishReason":"STOP"}]}"#);
        assert_eq!(last.len(), 2);
        assert_eq!(
            last[1].as_ref().unwrap().choices[0].finish_reason,
            Some(FinishReason::Stop)
        );
    }

    #[test]
    fn stream_endpoint_uses_sse_variant() {
        assert_eq!(
            GeminiAdapter.endpoint_path("gemini-test", true),
            "v1/models/gemini-test:streamGenerateContent?alt=sse"
        );
        assert_eq!(
            GeminiAdapter.endpoint_path("gemini-test", false),
            "v1/models/gemini-test:generateContent"
        );
    }
}
