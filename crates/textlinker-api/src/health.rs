use axum::{Json, extract::State};

use textlinker_types::api::HealthResponse;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.relay.stats();
    Json(HealthResponse {
        ok: true,
        tokens: stats.tokens,
        messages: stats.messages,
        pending_assemblies: stats.pending_assemblies,
    })
}
