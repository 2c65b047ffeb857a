use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use textlinker_relay::RelayError;
use textlinker_types::api::ErrorResponse;

/// Everything a handler can fail with, rendered as `{ok:false, error}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Invalid request body: {0}")]
    Body(#[from] JsonRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Relay(RelayError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Relay(RelayError::PayloadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Relay(RelayError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Relay(RelayError::NotFound) => StatusCode::NOT_FOUND,
            // Oversized bodies keep their 413; every other body problem is a bad request.
            ApiError::Body(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::Body(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
