//! Error types for sync sessions.

use thiserror::Error;

use crate::service::ServiceError;

/// Errors that can occur while running a sync session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The session has been unsubscribed or its worker has stopped.
    #[error("Sync session closed")]
    SessionClosed,

    /// Fetching the authoritative snapshot failed.
    #[error("Reconciliation failed: {0}")]
    Reconciliation(ServiceError),

    /// A forwarded request failed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// A configuration value is unusable.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_closed_display() {
        assert_eq!(SyncError::SessionClosed.to_string(), "Sync session closed");
    }

    #[test]
    fn reconciliation_error_display() {
        let error = SyncError::Reconciliation(ServiceError::Transport("timeout".to_string()));
        assert_eq!(
            error.to_string(),
            "Reconciliation failed: Transport error: timeout"
        );
    }

    #[test]
    fn service_error_converts() {
        let error: SyncError = ServiceError::NotFound("event".to_string()).into();
        assert_eq!(error.to_string(), "Service error: Not found: event");
    }

    #[test]
    fn invalid_config_display() {
        let error = SyncError::InvalidConfig("command_buffer must be positive".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid sync configuration: command_buffer must be positive"
        );
    }
}
