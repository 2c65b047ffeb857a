use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use textlinker_types::models::{LocalItem, Origin};
use textlinker_types::{MAX_TEXT_CHARS, char_len, mask_token};

use crate::api::RelayClient;
use crate::collaborators::{LocalItemStore, QrCodec, received_item, token_from_scan};
use crate::combined;
use crate::error::ClientError;
use crate::sync::{ReadOutcome, SyncSession, interpret_read, log_rejected_read};
use crate::upload::{UploadPolicy, UploadProgress, upload_payload};

/// Timing and sizing knobs for the app side of a pairing.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerPolicy {
    /// Refreshes are refused for this long after a successful upload.
    pub refresh_cooldown: chrono::Duration,
    /// Delay before the single retry of a failed upload.
    pub retry_delay: Duration,
    pub upload: UploadPolicy,
}

impl Default for ConsumerPolicy {
    fn default() -> Self {
        Self {
            refresh_cooldown: chrono::Duration::seconds(10),
            retry_delay: Duration::from_secs(3),
            upload: UploadPolicy::default(),
        }
    }
}

/// Result of a refresh that reached the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New text arrived and was saved locally.
    Received(LocalItem),
    NoNewText,
}

/// Summary of a delivered share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareReport {
    pub items: usize,
    pub chars: usize,
    pub attempts: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

/// Transition taken after one upload attempt.
#[derive(Debug)]
pub enum UploadOutcome {
    Delivered,
    RetryScheduled(ClientError),
    GaveUp(ClientError),
}

impl UploadOutcome {
    fn after(attempt: Attempt, result: Result<(), ClientError>) -> Self {
        match (attempt, result) {
            (_, Ok(())) => UploadOutcome::Delivered,
            // Another attempt holds the token; it is the retry.
            (_, Err(e @ ClientError::UploadInProgress)) => UploadOutcome::GaveUp(e),
            (_, Err(e @ ClientError::PayloadTooLarge(_))) => UploadOutcome::GaveUp(e),
            (Attempt::First, Err(e)) => UploadOutcome::RetryScheduled(e),
            (Attempt::Retry, Err(e)) => UploadOutcome::GaveUp(e),
        }
    }
}

/// The app side of a pairing: holds the scanned token, pushes local notes to
/// the relay and pulls back what the web side sent.
pub struct Consumer<S> {
    client: RelayClient,
    items: S,
    policy: ConsumerPolicy,
    session: Arc<Mutex<SyncSession>>,
    progress: Arc<UploadProgress>,
}

impl<S: LocalItemStore> Consumer<S> {
    pub fn new(client: RelayClient, items: S, policy: ConsumerPolicy) -> Self {
        Self {
            client,
            items,
            policy,
            session: Arc::new(Mutex::new(SyncSession::new())),
            progress: Arc::new(UploadProgress::new()),
        }
    }

    pub fn items(&self) -> &S {
        &self.items
    }

    pub fn progress(&self) -> Arc<UploadProgress> {
        self.progress.clone()
    }

    pub fn current_token(&self) -> Option<String> {
        self.session().current_token().map(str::to_string)
    }

    /// Pair with the token carried by a scanned value.
    pub fn scan(&self, raw: &str) -> Result<String, ClientError> {
        let token = token_from_scan(raw);
        if token.is_empty() {
            return Err(ClientError::InvalidInput("Scanned code carries no token".into()));
        }
        if self.session().set_token(token) {
            info!("Paired with token={}", mask_token(token));
        }
        Ok(token.to_string())
    }

    pub fn scan_image<Q: QrCodec>(&self, codec: &Q, image: &Q::Image) -> Result<String, ClientError> {
        let raw = codec
            .decode(image)
            .map_err(|e| ClientError::QrCode(Box::new(e)))?;
        self.scan(&raw)
    }

    /// Render the current token for the other side to scan.
    pub fn pairing_code<Q: QrCodec>(&self, codec: &Q) -> Result<Q::Image, ClientError> {
        let token = self.require_token()?;
        codec
            .encode(&token)
            .map_err(|e| ClientError::QrCode(Box::new(e)))
    }

    /// Bundle every local note into one combined payload and upload it,
    /// retrying once after `retry_delay` if the first attempt fails.
    pub async fn share_local_items(&self) -> Result<ShareReport, ClientError> {
        let token = self.require_token()?;
        let notes = self
            .items
            .list_local_items()
            .map_err(|e| ClientError::LocalStore(Box::new(e)))?;
        if notes.is_empty() {
            return Err(ClientError::InvalidInput("No local notes to upload".into()));
        }

        let payload = combined::encode(notes.iter().map(|n| n.content.as_str()));
        let chars = char_len(&payload);
        if chars >= MAX_TEXT_CHARS {
            return Err(ClientError::PayloadTooLarge(chars));
        }
        info!(
            "UPLOAD ATTEMPT token={} count={} len={}",
            mask_token(&token),
            notes.len(),
            chars
        );

        let mut attempt = Attempt::First;
        let mut attempts = 0u8;
        loop {
            attempts += 1;
            let result = self.attempt_upload(&token, &payload).await;
            match UploadOutcome::after(attempt, result) {
                UploadOutcome::Delivered => {
                    info!("Upload successful token={} attempts={}", mask_token(&token), attempts);
                    return Ok(ShareReport {
                        items: notes.len(),
                        chars,
                        attempts,
                    });
                }
                UploadOutcome::RetryScheduled(e) => {
                    warn!(
                        "Upload failed token={}: {}. Retrying in {:?}",
                        mask_token(&token),
                        e,
                        self.policy.retry_delay
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                    if self.current_token().as_deref() != Some(token.as_str()) {
                        return Err(ClientError::InvalidInput("Token changed before retry".into()));
                    }
                    attempt = Attempt::Retry;
                }
                UploadOutcome::GaveUp(e) => {
                    warn!("Upload failed token={}: {}", mask_token(&token), e);
                    return Err(e);
                }
            }
        }
    }

    /// Pull text sent by the web side, preferring the unread-web read and
    /// falling back to the legacy read on servers that lack it.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ClientError> {
        let token = self.require_token()?;
        let state = self.session().state(&token);
        state.check_refresh(Utc::now(), self.policy.refresh_cooldown)?;

        let mut raw = self.client.fetch_unread_web_raw(&token).await?;
        if raw.status == 404 {
            debug!("unread-web missing, falling back to legacy read token={}", mask_token(&token));
            raw = self.client.fetch_text_raw(&token).await?;
            if raw.status == 404 {
                return Ok(RefreshOutcome::NoNewText);
            }
        }
        if !(200..300).contains(&raw.status) {
            return Err(ClientError::Status {
                code: raw.status,
                body: raw.body,
            });
        }

        let outcome = interpret_read(&raw.body, state.last_uploaded_payload.as_deref())
            .inspect_err(|e| log_rejected_read(&token, e))?;
        match outcome {
            ReadOutcome::NewText(text) => {
                let item = received_item(&text);
                self.items
                    .save_item(item.clone())
                    .map_err(|e| ClientError::LocalStore(Box::new(e)))?;
                info!(
                    "Received text token={} len={} title='{}'",
                    mask_token(&token),
                    char_len(&text),
                    item.title
                );
                Ok(RefreshOutcome::Received(item))
            }
            ReadOutcome::NoNewText => {
                debug!("No new text token={}", mask_token(&token));
                Ok(RefreshOutcome::NoNewText)
            }
        }
    }

    async fn attempt_upload(&self, token: &str, payload: &str) -> Result<(), ClientError> {
        self.session().state_mut(token).begin_upload()?;
        let result = upload_payload(
            &self.client,
            token,
            payload,
            Origin::App,
            self.policy.upload,
            &self.progress,
        )
        .await;

        let mut session = self.session();
        if session.current_token() != Some(token) {
            debug!("Token changed during upload, dropping result for token={}", mask_token(token));
            return result;
        }
        let state = session.state_mut(token);
        match &result {
            Ok(()) => state.upload_succeeded(payload.to_string(), Utc::now()),
            Err(_) => state.upload_failed(),
        }
        result
    }

    fn require_token(&self) -> Result<String, ClientError> {
        self.current_token()
            .ok_or_else(|| ClientError::InvalidInput("No token scanned yet".into()))
    }

    fn session(&self) -> MutexGuard<'_, SyncSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
