//! Error types for vote operations.

use thiserror::Error;

use crate::meeting::ParticipantId;
use crate::service::ServiceError;

/// Errors that can occur when casting or removing a vote.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    /// The event has a published venue; votes are frozen.
    #[error("Voting is closed for this event")]
    VotingClosed,

    /// The participant is not part of the event.
    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// The service rejected the participant's credentials.
    ///
    /// The caller should clear the stored token.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// The vote request failed and the optimistic change was reverted.
    #[error("Vote request failed: {0}")]
    Service(ServiceError),

    /// The sync session has shut down.
    #[error("Sync session closed")]
    SessionClosed,
}

impl From<ServiceError> for VoteError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthorized(reason) => Self::Unauthorized(reason),
            other => Self::Service(other),
        }
    }
}

/// Result type for vote operations.
pub type VoteResult<T> = Result<T, VoteError>;
