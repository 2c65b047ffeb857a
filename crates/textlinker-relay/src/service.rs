use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use textlinker_types::models::{Message, Origin};
use textlinker_types::{MAX_TEXT_CHARS, char_len, mask_token};

use crate::assembler::{ChunkAssembler, ChunkReceipt};
use crate::clock::{Clock, SystemClock};
use crate::error::RelayError;
use crate::store::MessageStore;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Age after which an unfinished chunk assembly is dropped.
    pub chunk_ttl: Duration,
    /// How often the background sweep runs.
    pub sweep_interval: StdDuration,
    /// Token slots whose newest message is older than this are dropped.
    pub message_retention: Duration,
    /// Largest text accepted by a direct upload; bigger texts go through chunks.
    pub max_direct_chars: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_ttl: Duration::minutes(30),
            sweep_interval: StdDuration::from_secs(60),
            message_retention: Duration::hours(24),
            max_direct_chars: MAX_TEXT_CHARS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_assemblies: usize,
    pub purged_tokens: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub tokens: usize,
    pub messages: usize,
    pub pending_assemblies: usize,
}

/// Front door to the relay: direct and chunked uploads, unread and legacy
/// reads, and the periodic sweep. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayServiceInner>,
}

struct RelayServiceInner {
    config: RelayConfig,
    clock: Arc<dyn Clock>,
    messages: MessageStore,
    chunks: ChunkAssembler,
}

impl RelayService {
    pub fn new(config: RelayConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RelayConfig, clock: Arc<dyn Clock>) -> Self {
        let messages = MessageStore::new(clock.clone());
        let chunks = ChunkAssembler::new(clock.clone(), config.chunk_ttl);
        Self {
            inner: Arc::new(RelayServiceInner {
                config,
                clock,
                messages,
                chunks,
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Single-request upload.
    pub fn upload(&self, token: &str, text: &str, origin: Origin) -> Result<Message, RelayError> {
        let len = char_len(text);
        if len > self.inner.config.max_direct_chars {
            return Err(RelayError::PayloadTooLarge {
                len,
                limit: self.inner.config.max_direct_chars,
            });
        }
        self.inner.messages.append(token, text, origin)
    }

    /// Feed one chunk to the assembler. When it completes the payload, the
    /// assembled text is appended as a message with `origin`.
    pub fn submit_chunk(
        &self,
        token: &str,
        chunk_index: i64,
        total_chunks: i64,
        text: String,
        origin: Origin,
    ) -> Result<ChunkReceipt, RelayError> {
        let receipt = self
            .inner
            .chunks
            .submit_chunk(token, chunk_index, total_chunks, text)?;
        if let Some(full) = &receipt.assembled_text {
            self.inner.messages.append(token, full, origin)?;
        }
        Ok(receipt)
    }

    pub fn read_unread_web(&self, token: &str) -> Vec<Message> {
        self.inner.messages.read_unread_web(token)
    }

    pub fn read_latest(&self, token: &str) -> Result<Message, RelayError> {
        self.inner.messages.read_latest(token)
    }

    /// Fresh pairing token: 16 random bytes, hex encoded.
    pub fn generate_token(&self) -> String {
        let bytes: [u8; 16] = rand::random();
        let token = hex::encode(bytes);
        info!("[generate-token] token={}", mask_token(&token));
        token
    }

    /// Drop expired assemblies and idle token slots.
    pub fn sweep(&self) -> SweepReport {
        let now = self.inner.clock.now();
        SweepReport {
            expired_assemblies: self.inner.chunks.sweep_expired(now),
            purged_tokens: self
                .inner
                .messages
                .purge_idle(now, self.inner.config.message_retention),
        }
    }

    pub fn stats(&self) -> RelayStats {
        let (tokens, messages) = self.inner.messages.stats();
        RelayStats {
            tokens,
            messages,
            pending_assemblies: self.inner.chunks.pending_count(),
        }
    }
}
