//! Error types for the annotation server.

use confirmsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the annotation server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No route matches the request path.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request or response body could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_) | ServerError::NotFound(_) | ServerError::Codec(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Internal(_))
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Codec(_) => 400,
            ServerError::NotFound(_) => 404,
            ServerError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors() {
        assert!(ServerError::InvalidRequest("test".into()).is_client_error());
        assert!(ServerError::NotFound("/nope".into()).is_client_error());
        assert!(ServerError::Codec(ProtocolError::EmptyFieldName).is_client_error());
        assert!(!ServerError::Internal("test".into()).is_client_error());
    }

    #[test]
    fn server_errors() {
        assert!(ServerError::Internal("test".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("test".into()).is_server_error());
    }

    #[test]
    fn status_codes() {
        assert_eq!(ServerError::InvalidRequest("test".into()).status_code(), 400);
        assert_eq!(ServerError::NotFound("/nope".into()).status_code(), 404);
        assert_eq!(ServerError::Internal("test".into()).status_code(), 500);
    }

    #[test]
    fn error_display() {
        let err = ServerError::NotFound("/sites".into());
        assert_eq!(err.to_string(), "not found: /sites");
    }
}
