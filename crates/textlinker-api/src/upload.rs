use axum::{Json, extract::State};
use axum_extra::extract::WithRejection;
use tracing::warn;

use textlinker_types::api::{OkResponse, UploadRequest};
use textlinker_types::mask_token;
use textlinker_types::models::Origin;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /upload. `origin` defaults to `app`.
pub async fn upload(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<UploadRequest>, ApiError>,
) -> Result<Json<OkResponse>, ApiError> {
    let origin = req.origin.unwrap_or_default();
    store_upload(&state, req, origin, "upload")
}

/// POST /upload-web. Always stored as `web`, whatever the body says.
pub async fn upload_web(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<UploadRequest>, ApiError>,
) -> Result<Json<OkResponse>, ApiError> {
    store_upload(&state, req, Origin::Web, "upload-web")
}

fn store_upload(
    state: &AppState,
    req: UploadRequest,
    origin: Origin,
    route: &str,
) -> Result<Json<OkResponse>, ApiError> {
    let token = req.token.unwrap_or_default();
    let text = req.text.unwrap_or_default();

    state.relay.upload(&token, &text, origin).map_err(|e| {
        warn!("[{}] rejected token={}: {}", route, mask_token(&token), e);
        e
    })?;

    Ok(Json(OkResponse { ok: true }))
}
