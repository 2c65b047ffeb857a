use axum::{Json, extract::State};

use textlinker_types::api::TokenResponse;

use crate::state::AppState;

/// GET /generate-token
pub async fn generate_token(State(state): State<AppState>) -> Json<TokenResponse> {
    Json(TokenResponse {
        token: state.relay.generate_token(),
    })
}
