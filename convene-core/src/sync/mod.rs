//! Real-time synchronization of a meeting event replica.
//!
//! A [`SyncSession`] keeps one [`Replica`](crate::replica::Replica) in step
//! with the meeting service:
//!
//! 1. Open the event's push channel
//! 2. Discard anything before the channel reports it is connected
//! 3. Fetch the event and vote statistics concurrently and apply them
//! 4. Apply change events strictly in arrival order
//! 5. On failure, back off and reconnect, reconciling again
//!
//! Connection status and settled snapshots are published over `watch`
//! channels; notices over a `broadcast` channel.

mod config;
mod error;
mod session;
mod types;
mod worker;

pub use config::{BackoffConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use session::SyncSession;
pub use types::{ConnectionStatus, SyncNotice};
