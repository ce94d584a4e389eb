//! Error types for the sync engine.

use confirmsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Protocol error (invalid message format or flag name).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server failed while handling the request (5xx).
    #[error("server error: {0}")]
    ServerError(String),

    /// Server refused the request as invalid (4xx). Resending the same
    /// request fails the same way.
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// Status code of the response.
        status: u16,
        /// Reason given by the server.
        message: String,
    },

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,

    /// Loading annotations from the remote store failed.
    #[error("failed to load annotations: {source}")]
    Read {
        /// Underlying cause.
        source: Box<SyncError>,
    },

    /// Writing a batch of annotations to the remote store failed.
    #[error("failed to save annotations: {source}")]
    Write {
        /// Underlying cause.
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Wraps a cause as a read failure.
    pub fn read(source: SyncError) -> Self {
        Self::Read {
            source: Box::new(source),
        }
    }

    /// Wraps a cause as a write failure.
    pub fn write(source: SyncError) -> Self {
        Self::Write {
            source: Box::new(source),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::ServerError(_) => true,
            SyncError::Read { source } | SyncError::Write { source } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if the server refused the request itself.
    pub fn is_rejected(&self) -> bool {
        match self {
            SyncError::Rejected { .. } => true,
            SyncError::Read { source } | SyncError::Write { source } => source.is_rejected(),
            _ => false,
        }
    }

    /// Returns true for a failed write.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, SyncError::Write { .. })
    }

    /// Returns true for a failed read.
    pub fn is_read_failure(&self) -> bool {
        matches!(self, SyncError::Read { .. })
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::Transport {
            message: "invalid certificate".into(),
            retryable: false,
        }
        .is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::ServerError("internal error".into()).is_retryable());
        assert!(!SyncError::Protocol("bad body".into()).is_retryable());
        assert!(SyncError::write(SyncError::Timeout).is_retryable());
        assert!(!SyncError::read(SyncError::NotConnected).is_retryable());
    }

    #[test]
    fn rejected_requests_are_final() {
        let err = SyncError::write(SyncError::Rejected {
            status: 400,
            message: "invalid request: Empty field name".into(),
        });
        assert!(!err.is_retryable());
        assert!(err.is_rejected());
        assert_eq!(
            err.to_string(),
            "failed to save annotations: request rejected (400): invalid request: Empty field name"
        );
        assert!(!SyncError::write(SyncError::ServerError("boom".into())).is_rejected());
    }

    #[test]
    fn error_display() {
        let err = SyncError::NotConnected;
        assert_eq!(err.to_string(), "not connected to server");

        let err = SyncError::write(SyncError::transport_retryable("reset by peer"));
        assert!(err.is_write_failure());
        assert_eq!(
            err.to_string(),
            "failed to save annotations: transport error: reset by peer"
        );

        let err = SyncError::read(SyncError::Timeout);
        assert!(err.is_read_failure());
        assert!(err.to_string().starts_with("failed to load annotations"));
    }

    #[test]
    fn protocol_error_converts() {
        let err: SyncError = ProtocolError::UnknownFlag("verified".into()).into();
        assert!(matches!(err, SyncError::Protocol(msg) if msg.contains("verified")));
    }
}
