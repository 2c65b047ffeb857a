//! App side of a TextLinker pairing: talks to the relay over HTTP and keeps
//! the per-token state that stops a device reading back its own upload.

pub mod api;
pub mod collaborators;
pub mod combined;
pub mod consumer;
pub mod error;
pub mod sync;
pub mod upload;

pub use api::{RawResponse, RelayClient};
pub use collaborators::{LocalItemStore, QrCodec, received_item, token_from_scan};
pub use consumer::{Consumer, ConsumerPolicy, RefreshOutcome, ShareReport, UploadOutcome};
pub use error::{ClientError, RefreshBlocked};
pub use sync::{ReadOutcome, SyncSession, TokenSyncState, interpret_read};
pub use upload::{UploadPolicy, UploadProgress, split_chunks, upload_payload};
