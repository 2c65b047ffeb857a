use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, error, info};

use textlinker_types::{MAX_MESSAGES_PER_READ, MAX_TEXT_CHARS, char_len, mask_token};

use crate::combined::{count_delimiters, decide_if_bundled, extract_latest_candidate};
use crate::error::{ClientError, RefreshBlocked};

/// Client-side bookkeeping for one token, used to avoid reading back our own
/// upload as if it were new text from the peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSyncState {
    pub upload_in_progress: bool,
    pub last_uploaded_payload: Option<String>,
    pub last_upload_success_at: Option<DateTime<Utc>>,
}

impl TokenSyncState {
    /// Idle → uploading. Fails if another attempt already holds the token.
    pub fn begin_upload(&mut self) -> Result<(), ClientError> {
        if self.upload_in_progress {
            return Err(ClientError::UploadInProgress);
        }
        self.upload_in_progress = true;
        Ok(())
    }

    pub fn upload_succeeded(&mut self, payload: String, at: DateTime<Utc>) {
        self.upload_in_progress = false;
        self.last_uploaded_payload = Some(payload);
        self.last_upload_success_at = Some(at);
    }

    /// Leaves the echo record of the previous successful upload untouched.
    pub fn upload_failed(&mut self) {
        self.upload_in_progress = false;
    }

    pub fn check_refresh(&self, now: DateTime<Utc>, cooldown: Duration) -> Result<(), RefreshBlocked> {
        if self.upload_in_progress {
            return Err(RefreshBlocked::UploadInProgress);
        }
        if let Some(at) = self.last_upload_success_at {
            let elapsed = now - at;
            if elapsed < cooldown {
                return Err(RefreshBlocked::Cooldown {
                    remaining: cooldown - elapsed,
                });
            }
        }
        Ok(())
    }
}

/// Which token the consumer is paired with, plus sync state per token.
#[derive(Debug, Default)]
pub struct SyncSession {
    current: Option<String>,
    tokens: HashMap<String, TokenSyncState>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_token(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Switch to `token`. State held for a different previous token is
    /// dropped; rescanning the same token keeps it.
    pub fn set_token(&mut self, token: &str) -> bool {
        let changed = self.current.as_deref() != Some(token);
        if changed {
            if let Some(previous) = self.current.take() {
                self.tokens.remove(&previous);
                debug!("Token changed: cleared state for previous token={}", mask_token(&previous));
            }
            self.current = Some(token.to_string());
        }
        changed
    }

    pub fn state(&self, token: &str) -> TokenSyncState {
        self.tokens.get(token).cloned().unwrap_or_default()
    }

    pub fn state_mut(&mut self, token: &str) -> &mut TokenSyncState {
        self.tokens.entry(token.to_string()).or_default()
    }
}

/// What a successful read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    NewText(String),
    /// Nothing new: empty read, or only our own upload came back.
    NoNewText,
}

/// Interpret the body of an unread-web or legacy read.
///
/// Anything that does not match the expected shapes is rejected outright;
/// nothing is partially applied.
pub fn interpret_read(body: &str, last_uploaded: Option<&str>) -> Result<ReadOutcome, ClientError> {
    let json: Value = serde_json::from_str(body).map_err(|_| {
        ClientError::UnexpectedShape(format!(
            "non-json prefix={}",
            body.chars().take(120).collect::<String>()
        ))
    })?;

    if let Some(messages) = json.get("messages") {
        let messages = messages
            .as_array()
            .ok_or_else(|| ClientError::UnexpectedShape("messages is not an array".into()))?;
        if messages.len() > MAX_MESSAGES_PER_READ {
            return Err(ClientError::UnexpectedShape(format!(
                "messages>{} len={}",
                MAX_MESSAGES_PER_READ,
                messages.len()
            )));
        }

        let mut texts = Vec::with_capacity(messages.len());
        for message in messages {
            let text = message
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| ClientError::UnexpectedShape("message without text".into()))?;
            // One oversized entry rejects the whole read.
            let len = char_len(text);
            if len >= MAX_TEXT_CHARS {
                return Err(ClientError::PayloadTooLarge(len));
            }
            texts.push(text);
        }

        // Newest first; skip blanks and our own echo.
        let candidate = texts
            .into_iter()
            .rev()
            .find(|t| !t.is_empty() && Some(*t) != last_uploaded)
            .map(select_candidate);
        debug!(
            "PARSE: messagesArr={} candidateLen={}",
            messages.len(),
            candidate.as_deref().map(char_len).unwrap_or(0)
        );
        return match candidate {
            Some(candidate) => accept_candidate(candidate, last_uploaded),
            None => Ok(ReadOutcome::NoNewText),
        };
    }

    if let Some(text) = json.get("text").and_then(Value::as_str) {
        debug!(
            "PARSE: legacy text len={} delimCount={}",
            char_len(text),
            count_delimiters(text)
        );
        if Some(text) == last_uploaded {
            return Ok(ReadOutcome::NoNewText);
        }
        return accept_candidate(select_candidate(text), last_uploaded);
    }

    Err(ClientError::UnexpectedShape("no text/messages".into()))
}

fn select_candidate(text: &str) -> String {
    if decide_if_bundled(text) {
        extract_latest_candidate(text)
    } else {
        text.to_string()
    }
}

fn accept_candidate(candidate: String, last_uploaded: Option<&str>) -> Result<ReadOutcome, ClientError> {
    let len = char_len(&candidate);
    if len >= MAX_TEXT_CHARS {
        return Err(ClientError::PayloadTooLarge(len));
    }
    if candidate.is_empty() || Some(candidate.as_str()) == last_uploaded {
        return Ok(ReadOutcome::NoNewText);
    }
    Ok(ReadOutcome::NewText(candidate))
}

/// Log a rejected read the way every caller should surface it.
pub(crate) fn log_rejected_read(token: &str, err: &ClientError) {
    match err {
        ClientError::UnexpectedShape(reason) => {
            error!("REFRESH SKIPPED unexpectedShape token={} reason={}", mask_token(token), reason)
        }
        ClientError::PayloadTooLarge(len) => {
            error!("REFRESH SKIPPED textTooLarge token={} len={}", mask_token(token), len)
        }
        other => info!("Refresh failed token={}: {}", mask_token(token), other),
    }
}
