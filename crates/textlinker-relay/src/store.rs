use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use textlinker_types::models::{Message, Origin};
use textlinker_types::{MAX_TEXT_CHARS, char_len, mask_token};

use crate::clock::Clock;
use crate::error::RelayError;

/// Per-token log of delivered texts.
///
/// One mutex guards the whole token map. Every operation is a short in-memory
/// pass, so holding it across an append or an unread read is what makes those
/// atomic per token.
pub struct MessageStore {
    slots: Mutex<HashMap<String, Vec<Message>>>,
    clock: Arc<dyn Clock>,
}

impl MessageStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Vec<Message>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `text` under `token`, creating the token's slot on first use.
    pub fn append(&self, token: &str, text: &str, origin: Origin) -> Result<Message, RelayError> {
        if token.is_empty() {
            return Err(RelayError::invalid("Invalid token"));
        }
        if text.is_empty() {
            return Err(RelayError::invalid("Invalid text"));
        }
        let len = char_len(text);
        if len >= MAX_TEXT_CHARS {
            return Err(RelayError::PayloadTooLarge {
                len,
                limit: MAX_TEXT_CHARS,
            });
        }

        let created_at = self.clock.now();
        let message = Message {
            id: generate_id(created_at),
            origin,
            text: text.to_string(),
            created_at,
            consumed: false,
        };

        self.slots()
            .entry(token.to_string())
            .or_default()
            .push(message.clone());

        info!(
            "[upload] token={} origin={} len={} id={}",
            mask_token(token),
            origin,
            len,
            message.id
        );
        Ok(message)
    }

    /// Return every unconsumed web-origin message for `token`, oldest first,
    /// and mark them consumed in the same critical section.
    pub fn read_unread_web(&self, token: &str) -> Vec<Message> {
        let mut slots = self.slots();
        let Some(messages) = slots.get_mut(token) else {
            debug!("[unread-web] token={} found=0 (no slot)", mask_token(token));
            return Vec::new();
        };

        let mut unread: Vec<Message> = Vec::new();
        for msg in messages
            .iter_mut()
            .filter(|m| m.origin == Origin::Web && !m.consumed)
        {
            msg.consumed = true;
            unread.push(msg.clone());
        }
        // Stable sort keeps insertion order for equal timestamps.
        unread.sort_by_key(|m| m.created_at);

        let ids: Vec<&str> = unread.iter().map(|m| m.id.as_str()).collect();
        info!(
            "[unread-web] token={} found={} consumed=[{}]",
            mask_token(token),
            unread.len(),
            ids.join(",")
        );
        unread
    }

    /// Most recently appended message regardless of origin or consumed state.
    pub fn read_latest(&self, token: &str) -> Result<Message, RelayError> {
        let latest = self
            .slots()
            .get(token)
            .and_then(|messages| messages.last().cloned())
            .ok_or(RelayError::NotFound)?;
        debug!(
            "[text-legacy] token={} returning latest id={}",
            mask_token(token),
            latest.id
        );
        Ok(latest)
    }

    /// Drop token slots whose newest message is older than `retention`.
    /// Returns the number of slots removed.
    pub fn purge_idle(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, messages| {
            messages
                .last()
                .is_some_and(|newest| now - newest.created_at <= retention)
        });
        before - slots.len()
    }

    /// (token count, message count)
    pub fn stats(&self) -> (usize, usize) {
        let slots = self.slots();
        let messages = slots.values().map(Vec::len).sum();
        (slots.len(), messages)
    }
}

fn generate_id(created_at: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", created_at.timestamp_millis(), &random[..12])
}
