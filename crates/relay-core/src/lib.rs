//! Shared building blocks for the relay gateway crates

pub mod error;
pub mod ids;
pub mod url;

pub use error::HttpError;
pub use ids::{completion_id, unix_now};
pub use url::join_url;
