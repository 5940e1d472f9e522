//! Error types for the API layer.

use medassist_transport::{StatusCode, TransportError};

/// Errors returned by [`ApiClient`](crate::ApiClient) calls.
///
/// Unlike the transport layer, HTTP error statuses *are* errors here: a
/// caller asking for a conversation list wants a list, not a 404.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response, or a response body that didn't match the endpoint's shape.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Still 401 after the session's one renewal attempt.
    /// The session has been cleared; the user has to sign in again.
    #[error("not signed in, or the session has expired")]
    Unauthorized,

    /// Any other non-2xx status. `message` is the server's `detail`
    /// field when it sent one, else the raw body.
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Rejected before sending (for example, a non-image upload).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// The HTTP status behind this error, if it came from one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_includes_code_and_message() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            message: "Conversation not found".into(),
        };

        assert_eq!(err.to_string(), "server returned 404 Not Found: Conversation not found");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_from_transport_error() {
        let err: ApiError = TransportError::Request("refused".into()).into();

        assert!(matches!(err, ApiError::Transport(_)));
        assert!(err.to_string().contains("refused"));
        assert_eq!(err.status(), None);
    }
}
