//! HTTP/JSON surface of the relay.

pub mod chunks;
pub mod error;
pub mod health;
pub mod state;
pub mod text;
pub mod token;
pub mod upload;

use axum::{
    Router,
    routing::{get, post},
};

pub use error::ApiError;
pub use state::AppState;

/// All relay routes with state attached. Layers (CORS, tracing, body limit)
/// are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate-token", get(token::generate_token))
        .route("/upload", post(upload::upload))
        .route("/upload-web", post(upload::upload_web))
        .route("/upload-chunk", post(chunks::upload_chunk))
        .route("/text/{token}/unread-web", get(text::unread_web))
        .route("/text/{token}", get(text::latest_text))
        .route("/health", get(health::health))
        .with_state(state)
}
