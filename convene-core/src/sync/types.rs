//! Types for sync session status and notices.

use crate::service::ServiceError;

/// Connection status of a sync session.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Reconnecting -> Connected
///                                                         -> Disconnected { gave_up: true }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected. `gave_up` is set once retries are exhausted; the
    /// session then waits for an explicit reconnect.
    Disconnected {
        /// Whether retries were exhausted
        gave_up: bool,
    },

    /// Opening the push channel for the first time.
    Connecting,

    /// The push channel is live.
    Connected,

    /// Waiting to retry after a failure.
    Reconnecting {
        /// Retry number, starting at 1
        attempt: u32,
    },
}

impl ConnectionStatus {
    /// Returns true if the push channel is live.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if retries were exhausted.
    #[must_use]
    pub const fn has_given_up(&self) -> bool {
        matches!(self, Self::Disconnected { gave_up: true })
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::Disconnected { gave_up: false }
    }
}

/// Something a sync session wants observers to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// An authoritative snapshot was applied.
    Reconciled,

    /// Fetching the authoritative snapshot failed.
    ReconciliationFailed(ServiceError),

    /// A change message could not be decoded and was dropped.
    EventDropped {
        /// Decoder error
        reason: String,
    },

    /// Vote deltas were missed; a reconciliation follows.
    GapDetected {
        /// Sequence number that should have come next
        expected: u64,
        /// Sequence number received
        received: u64,
    },
}
