use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use textlinker_types::{MAX_TEXT_CHARS, char_len, mask_token};

use crate::clock::Clock;
use crate::error::RelayError;

/// Reconstruction state for one token's chunked upload.
struct ChunkAssembly {
    total_chunks: u32,
    parts: BTreeMap<u32, String>,
    /// Sum of the chars currently held in `parts`.
    chars: usize,
    created_at: DateTime<Utc>,
}

impl ChunkAssembly {
    fn new(total_chunks: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            total_chunks,
            parts: BTreeMap::new(),
            chars: 0,
            created_at,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }

    fn is_complete(&self) -> bool {
        self.parts.len() == self.total_chunks as usize
    }

    /// Concatenate every part in index order.
    fn concat(&self) -> Result<String, RelayError> {
        let mut full = String::new();
        for i in 0..self.total_chunks {
            let part = self
                .parts
                .get(&i)
                .ok_or_else(|| RelayError::Conflict(format!("Missing chunk {}", i)))?;
            full.push_str(part);
        }
        Ok(full)
    }
}

/// Result of an accepted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReceipt {
    pub received_index: u32,
    /// Full text, set only when this chunk completed the assembly.
    pub assembled_text: Option<String>,
}

/// Reassembles payloads that clients split across several `/upload-chunk`
/// requests. At most one assembly is live per token.
pub struct ChunkAssembler {
    assemblies: Mutex<HashMap<String, ChunkAssembly>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ChunkAssembler {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            assemblies: Mutex::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    fn assemblies(&self) -> MutexGuard<'_, HashMap<String, ChunkAssembly>> {
        self.assemblies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn submit_chunk(
        &self,
        token: &str,
        chunk_index: i64,
        total_chunks: i64,
        text: String,
    ) -> Result<ChunkReceipt, RelayError> {
        let masked = mask_token(token);
        if token.is_empty() || chunk_index < 0 || total_chunks <= 0 {
            warn!(
                "[upload-chunk] Bad request: token={} idx={} total={}",
                masked, chunk_index, total_chunks
            );
            return Err(RelayError::invalid("Invalid request parameters"));
        }
        if chunk_index >= total_chunks {
            warn!("[upload-chunk] Invalid chunk index: {} >= {}", chunk_index, total_chunks);
            return Err(RelayError::invalid("chunkIndex must be < totalChunks"));
        }
        let (Ok(index), Ok(total)) = (u32::try_from(chunk_index), u32::try_from(total_chunks)) else {
            return Err(RelayError::invalid("Invalid request parameters"));
        };

        let len = char_len(&text);
        debug!(
            "[upload-chunk] token={} idx={}/{} len={}",
            masked, index, total, len
        );

        let now = self.clock.now();
        let mut assemblies = self.assemblies();

        if assemblies
            .get(token)
            .is_some_and(|a| a.is_expired(now, self.ttl))
        {
            info!("[upload-chunk] Discarding expired assembly for token={}", masked);
            assemblies.remove(token);
        }

        let assembly = assemblies.entry(token.to_string()).or_insert_with(|| {
            debug!("[upload-chunk] Created new assembly for token={} total={}", masked, total);
            ChunkAssembly::new(total, now)
        });

        if assembly.total_chunks != total {
            warn!(
                "[upload-chunk] Total chunks mismatch: expected={} got={}",
                assembly.total_chunks, total
            );
            return Err(RelayError::Conflict(
                "totalChunks mismatch with existing assembly".into(),
            ));
        }

        // The assembled text could never be stored once it reaches the limit.
        let replaced = assembly.parts.get(&index).map_or(0, |p| char_len(p));
        let held = assembly.chars - replaced + len;
        if held >= MAX_TEXT_CHARS {
            assemblies.remove(token);
            warn!(
                "[upload-chunk] Assembly too large token={} held={} limit={}, dropped",
                masked, held, MAX_TEXT_CHARS
            );
            return Err(RelayError::PayloadTooLarge {
                len: held,
                limit: MAX_TEXT_CHARS,
            });
        }
        assembly.parts.insert(index, text);
        assembly.chars = held;
        debug!(
            "[upload-chunk] Stored chunk {}, assembly now has {}/{} parts",
            index,
            assembly.parts.len(),
            assembly.total_chunks
        );

        if !assembly.is_complete() {
            return Ok(ChunkReceipt {
                received_index: index,
                assembled_text: None,
            });
        }

        let full = assembly.concat()?;
        assemblies.remove(token);
        info!(
            "[upload-chunk] ASSEMBLED token={} totalLen={}",
            masked,
            char_len(&full)
        );

        Ok(ChunkReceipt {
            received_index: index,
            assembled_text: Some(full),
        })
    }

    /// Delete every assembly older than the TTL, complete or not.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut assemblies = self.assemblies();
        let before = assemblies.len();
        assemblies.retain(|token, assembly| {
            let keep = !assembly.is_expired(now, self.ttl);
            if !keep {
                info!("[cleanup] Removing expired chunks for token={}", mask_token(token));
            }
            keep
        });
        before - assemblies.len()
    }

    pub fn pending_count(&self) -> usize {
        self.assemblies().len()
    }
}
