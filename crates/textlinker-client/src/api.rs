use reqwest::{Client, Response, Url};
use tracing::{debug, warn};

use textlinker_types::api::{ChunkAckResponse, TokenResponse, UploadChunkRequest, UploadRequest};
use textlinker_types::models::Origin;
use textlinker_types::{char_len, mask_token};

use crate::error::ClientError;

/// Status and body of a read, kept raw so the caller can apply its own
/// shape checks before trusting anything in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Thin async wrapper over the relay's HTTP endpoints.
#[derive(Clone)]
pub struct RelayClient {
    http: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /generate-token
    pub async fn generate_token(&self) -> Result<String, ClientError> {
        let resp = self
            .http
            .get(format!("{}/generate-token", self.base_url))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::UnexpectedShape(format!("token response: {}", e)))?;
        Ok(body.token)
    }

    /// POST /upload with an explicit origin.
    pub async fn upload_text(&self, token: &str, text: &str, origin: Origin) -> Result<(), ClientError> {
        debug!(
            "uploadText: token={} origin={} len={}",
            mask_token(token),
            origin,
            char_len(text)
        );
        let body = UploadRequest {
            token: Some(token.to_string()),
            text: Some(text.to_string()),
            origin: Some(origin),
        };
        self.post_json("upload", &body).await.map(|_| ())
    }

    /// POST /upload-web, the web page's upload path.
    pub async fn upload_web_text(&self, token: &str, text: &str) -> Result<(), ClientError> {
        let body = UploadRequest {
            token: Some(token.to_string()),
            text: Some(text.to_string()),
            origin: None,
        };
        self.post_json("upload-web", &body).await.map(|_| ())
    }

    /// POST /upload-chunk
    pub async fn upload_chunk(
        &self,
        token: &str,
        chunk_index: usize,
        total_chunks: usize,
        text_chunk: &str,
        origin: Origin,
    ) -> Result<ChunkAckResponse, ClientError> {
        debug!(
            "uploadChunk: token={} idx={}/{} len={}",
            mask_token(token),
            chunk_index + 1,
            total_chunks,
            char_len(text_chunk)
        );
        let body = UploadChunkRequest {
            token: Some(token.to_string()),
            chunk_index: Some(chunk_index as i64),
            total_chunks: Some(total_chunks as i64),
            text_chunk: Some(text_chunk.to_string()),
            origin: Some(origin),
        };
        let resp = self.post_json("upload-chunk", &body).await?;
        resp.json()
            .await
            .map_err(|e| ClientError::UnexpectedShape(format!("chunk ack: {}", e)))
    }

    /// GET /text/{token}/unread-web, body returned verbatim.
    pub async fn fetch_unread_web_raw(&self, token: &str) -> Result<RawResponse, ClientError> {
        self.get_raw(self.text_url(token, Some("unread-web"))?).await
    }

    /// GET /text/{token}, body returned verbatim.
    pub async fn fetch_text_raw(&self, token: &str) -> Result<RawResponse, ClientError> {
        self.get_raw(self.text_url(token, None)?).await
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ClientError> {
        let resp = self
            .http
            .post(format!("{}/{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        ensure_success(resp).await
    }

    async fn get_raw(&self, url: Url) -> Result<RawResponse, ClientError> {
        let path = url.path().to_string();
        let resp = self.http.get(url).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!(
            "IN HTTP {} code={} bodyPrefix={}",
            path,
            status,
            body.chars().take(200).collect::<String>()
        );
        Ok(RawResponse { status, body })
    }

    fn text_url(&self, token: &str, suffix: Option<&str>) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidInput(format!("bad server url: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidInput("server url cannot take a path".into()))?;
            segments.pop_if_empty().push("text").push(token);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }
}

async fn ensure_success(resp: Response) -> Result<Response, ClientError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let path = resp.url().path().to_string();
    let body = resp.text().await.unwrap_or_default();
    warn!("Request to {} failed ({}): {}", path, status, body);
    Err(ClientError::Status {
        code: status.as_u16(),
        body,
    })
}
