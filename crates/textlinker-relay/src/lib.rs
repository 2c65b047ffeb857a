//! In-memory core of the TextLinker relay.
//!
//! Holds token-scoped messages and in-flight chunk assemblies. Nothing here
//! touches the network or the disk; the HTTP surface lives in
//! `textlinker-api`.

pub mod assembler;
pub mod cleanup;
pub mod clock;
pub mod error;
pub mod service;
pub mod store;

pub use assembler::{ChunkAssembler, ChunkReceipt};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::RelayError;
pub use service::{RelayConfig, RelayService, RelayStats, SweepReport};
pub use store::MessageStore;
