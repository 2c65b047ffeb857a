use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Origin;

// -- Uploads --

/// Body of `POST /upload` and `POST /upload-web`.
///
/// Fields are optional so that a missing token or text is reported as an
/// invalid-input error rather than a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    pub token: Option<String>,
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

/// Body of `POST /upload-chunk`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkRequest {
    pub token: Option<String>,
    pub chunk_index: Option<i64>,
    pub total_chunks: Option<i64>,
    pub text_chunk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAckResponse {
    pub ok: bool,
    pub received_index: u32,
    /// Present (and true) only on the request that completed the assembly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembled: Option<bool>,
}

// -- Reads --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebMessage {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadWebResponse {
    pub ok: bool,
    pub messages: Vec<WebMessage>,
}

/// Legacy `GET /text/{token}` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestTextResponse {
    pub text: String,
}

// -- Misc --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub tokens: usize,
    pub messages: usize,
    pub pending_assemblies: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_request_uses_camel_case() {
        let req: UploadChunkRequest = serde_json::from_str(
            r#"{"token":"t1","chunkIndex":0,"totalChunks":2,"textChunk":"foo"}"#,
        )
        .unwrap();
        assert_eq!(req.chunk_index, Some(0));
        assert_eq!(req.total_chunks, Some(2));
        assert_eq!(req.text_chunk.as_deref(), Some("foo"));
        assert_eq!(req.origin, None);
    }

    #[test]
    fn partial_ack_omits_assembled() {
        let ack = ChunkAckResponse { ok: true, received_index: 3, assembled: None };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json, serde_json::json!({"ok": true, "receivedIndex": 3}));
    }
}
