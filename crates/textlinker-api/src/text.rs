use axum::{
    Json,
    extract::{Path, State},
};

use textlinker_types::api::{LatestTextResponse, UnreadWebResponse, WebMessage};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /text/{token}/unread-web: returns and consumes unread web-origin messages.
pub async fn unread_web(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Json<UnreadWebResponse> {
    let messages = state
        .relay
        .read_unread_web(&token)
        .into_iter()
        .map(|m| WebMessage {
            id: m.id,
            text: m.text,
            created_at: m.created_at,
        })
        .collect();

    Json(UnreadWebResponse { ok: true, messages })
}

/// GET /text/{token}: legacy read of the latest message, any origin.
pub async fn latest_text(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<LatestTextResponse>, ApiError> {
    let latest = state.relay.read_latest(&token)?;
    Ok(Json(LatestTextResponse { text: latest.text }))
}
