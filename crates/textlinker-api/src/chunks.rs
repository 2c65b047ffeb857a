use axum::{Json, extract::State};
use axum_extra::extract::WithRejection;
use tracing::warn;

use textlinker_relay::RelayError;
use textlinker_types::api::{ChunkAckResponse, UploadChunkRequest};
use textlinker_types::mask_token;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /upload-chunk: one piece of a payload too large for `/upload`.
///
/// Partial chunks are acknowledged with `receivedIndex`; the chunk that
/// completes the assembly also carries `assembled: true`, by which point the
/// full text has been stored like a direct upload.
pub async fn upload_chunk(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<UploadChunkRequest>, ApiError>,
) -> Result<Json<ChunkAckResponse>, ApiError> {
    let token = req.token.unwrap_or_default();
    let (Some(chunk_index), Some(total_chunks), Some(text_chunk)) =
        (req.chunk_index, req.total_chunks, req.text_chunk)
    else {
        warn!("[upload-chunk] Bad request: token={} missing fields", mask_token(&token));
        return Err(RelayError::invalid("Invalid request parameters").into());
    };

    let receipt = state.relay.submit_chunk(
        &token,
        chunk_index,
        total_chunks,
        text_chunk,
        req.origin.unwrap_or_default(),
    )?;

    Ok(Json(ChunkAckResponse {
        ok: true,
        received_index: receipt.received_index,
        assembled: receipt.assembled_text.map(|_| true),
    }))
}
