//! Canonical types for chat request/response representation
//!
//! The canonical shape mirrors the widely deployed OpenAI chat-completion
//! schema; every provider dialect converts to and from these types.

mod message;
mod request;
mod response;
mod stream;

pub use message::{ChatMessage, Role};
pub use request::ChatRequest;
pub use response::{ChatResponse, Choice, ChoiceMessage, FinishReason, Usage};
pub use stream::{StreamChoice, StreamChunk, StreamContext, StreamDelta};
