use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use tracing::{debug, info};

use textlinker_types::models::Origin;
use textlinker_types::{char_len, mask_token};

use crate::api::RelayClient;
use crate::error::ClientError;

/// Transfer state constants.
pub const STATE_IDLE: u8 = 0;
pub const STATE_UPLOADING: u8 = 1;
pub const STATE_COMPLETE: u8 = 2;
pub const STATE_ERROR: u8 = 3;

/// Shared progress of one payload upload, readable from another task while
/// the upload runs.
#[derive(Debug)]
pub struct UploadProgress {
    pub chunks_done: AtomicUsize,
    pub chunks_total: AtomicUsize,
    pub state: AtomicU8,
}

impl UploadProgress {
    pub fn new() -> Self {
        Self {
            chunks_done: AtomicUsize::new(0),
            chunks_total: AtomicUsize::new(0),
            state: AtomicU8::new(STATE_IDLE),
        }
    }

    pub fn state(&self) -> u8 {
        self.state.load(Ordering::Relaxed)
    }
}

/// How a payload gets to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Payloads up to this many chars go in one `/upload` request.
    pub max_direct_chars: usize,
    /// Chunk size in chars for anything larger.
    pub chunk_chars: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_direct_chars: textlinker_types::DEFAULT_CHUNK_CHARS,
            chunk_chars: textlinker_types::DEFAULT_CHUNK_CHARS,
        }
    }
}

/// Split `text` into pieces of at most `chunk_chars` chars, never inside a
/// code point. An empty text yields no chunks.
pub fn split_chunks(text: &str, chunk_chars: usize) -> Vec<&str> {
    let chunk_chars = chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == chunk_chars {
            chunks.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Upload one payload, directly or in chunks depending on its size.
///
/// A chunked upload only counts as delivered once the final chunk's ack
/// reports the text as assembled.
pub async fn upload_payload(
    client: &RelayClient,
    token: &str,
    text: &str,
    origin: Origin,
    policy: UploadPolicy,
    progress: &UploadProgress,
) -> Result<(), ClientError> {
    let len = char_len(text);
    progress.state.store(STATE_UPLOADING, Ordering::Relaxed);
    progress.chunks_done.store(0, Ordering::Relaxed);

    let result = if len <= policy.max_direct_chars {
        progress.chunks_total.store(1, Ordering::Relaxed);
        let result = client.upload_text(token, text, origin).await;
        if result.is_ok() {
            progress.chunks_done.store(1, Ordering::Relaxed);
        }
        result
    } else {
        upload_chunked(client, token, text, origin, policy.chunk_chars, progress).await
    };

    let state = if result.is_ok() { STATE_COMPLETE } else { STATE_ERROR };
    progress.state.store(state, Ordering::Relaxed);
    result
}

async fn upload_chunked(
    client: &RelayClient,
    token: &str,
    text: &str,
    origin: Origin,
    chunk_chars: usize,
    progress: &UploadProgress,
) -> Result<(), ClientError> {
    let chunks = split_chunks(text, chunk_chars);
    let total = chunks.len();
    progress.chunks_total.store(total, Ordering::Relaxed);
    info!(
        "Chunked upload: token={} len={} chunks={}",
        mask_token(token),
        char_len(text),
        total
    );

    let mut assembled = false;
    for (index, chunk) in chunks.iter().enumerate() {
        let ack = client.upload_chunk(token, index, total, chunk, origin).await?;
        if ack.received_index as usize != index {
            return Err(ClientError::UnexpectedShape(format!(
                "chunk ack for {} while sending {}",
                ack.received_index, index
            )));
        }
        progress.chunks_done.fetch_add(1, Ordering::Relaxed);
        assembled = ack.assembled.unwrap_or(false);
        debug!("Chunk {}/{} acked, assembled={}", index + 1, total, assembled);
    }

    if !assembled {
        return Err(ClientError::UnexpectedShape(
            "final chunk acked without assembly".into(),
        ));
    }
    Ok(())
}
