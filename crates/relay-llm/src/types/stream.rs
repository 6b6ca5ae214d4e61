use serde::{Deserialize, Serialize};

use super::response::{FinishReason, Usage};

/// Envelope data shared by every chunk of one streamed response
#[derive(Debug, Clone)]
pub struct StreamContext {
    pub id: String,
    pub model: String,
    pub created: u64,
}

/// Incremental update within a streaming choice
///
/// The opening chunk carries `role`, body chunks carry `content`, and the
/// terminal chunk is empty with `finish_reason` set on the choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Canonical streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub id: String,
    /// Always "chat.completion.chunk"
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<StreamChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    fn envelope(ctx: &StreamContext, delta: StreamDelta, finish_reason: Option<FinishReason>) -> Self {
        Self {
            id: ctx.id.clone(),
            object: "chat.completion.chunk".to_owned(),
            created: ctx.created,
            model: ctx.model.clone(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage: None,
        }
    }

    /// Opening chunk announcing the assistant role
    pub fn role(ctx: &StreamContext) -> Self {
        Self::envelope(
            ctx,
            StreamDelta {
                role: Some("assistant".to_owned()),
                content: None,
            },
            None,
        )
    }

    /// Body chunk carrying a content fragment
    pub fn content(ctx: &StreamContext, text: impl Into<String>) -> Self {
        Self::envelope(
            ctx,
            StreamDelta {
                role: None,
                content: Some(text.into()),
            },
            None,
        )
    }

    /// Terminal chunk carrying the finish reason and optional usage
    pub fn finish(ctx: &StreamContext, reason: FinishReason, usage: Option<Usage>) -> Self {
        let mut chunk = Self::envelope(ctx, StreamDelta::default(), Some(reason));
        chunk.usage = usage;
        chunk
    }
}
