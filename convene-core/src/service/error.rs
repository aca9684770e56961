//! Error types for meeting service calls.
//!
//! These are the failures a [`MeetingService`](super::MeetingService)
//! implementation reports back to the core. The core decides per call site
//! which ones it recovers from.

use thiserror::Error;

/// Errors returned by the external meeting service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request never got a response (network, timeout, stream drop).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The requested state already exists (e.g. duplicate vote).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The participant token is missing, stale, or invalid.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// The target resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service refused the request.
    #[error("Request rejected ({status}): {reason}")]
    Rejected {
        /// Status code reported by the service.
        status: u16,
        /// The rejection reason.
        reason: String,
    },

    /// The response could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

/// Result type for service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;
