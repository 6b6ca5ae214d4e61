use axum::response::IntoResponse;
use http::StatusCode;

/// Liveness endpoint
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
