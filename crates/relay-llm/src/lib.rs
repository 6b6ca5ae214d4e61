//! Routing and dispatch core of the relay gateway
//!
//! Provides the canonical chat-completion endpoint over multiple upstream
//! LLM providers (OpenAI-compatible, Anthropic, Gemini) with health-driven
//! route selection, per-route rotation state, streaming translation, and
//! bounded cross-provider retry.

pub mod dialect;
pub mod error;
pub mod handler;
pub mod health;
pub mod protocol;
pub mod registry;
pub mod rotation;
pub mod selector;
pub mod state;
pub mod types;

pub use error::GatewayError;
pub use handler::gateway_router;
pub use health::{HealthProber, ProbeReport};
pub use registry::ProviderRegistry;
pub use selector::{RouteSelector, Selection};
pub use state::GatewayState;
pub use types::{ChatRequest, ChatResponse, StreamChunk};
