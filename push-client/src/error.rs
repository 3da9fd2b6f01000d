//! Error types for the push-client crate.

/// Errors raised while establishing or reading a push channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured endpoint cannot be used to build a push URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The handshake did not complete (network unreachable, protocol error, ...)
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The server refused the session (bad token, user mismatch)
    #[error("Handshake rejected ({status}): {reason}")]
    Rejected {
        /// HTTP status or WebSocket close code reported by the server
        status: u16,
        /// Human readable reason
        reason: String,
    },

    /// The handshake exceeded the configured timeout
    #[error("Handshake timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The established channel failed while reading or writing
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// An inbound frame exceeded the configured size limit
    #[error("Frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge {
        /// Size of the rejected frame
        size: usize,
        /// Configured limit
        limit: usize,
    },
}

/// Reasons a session identity is refused before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// User ids are assigned by the backend starting at 1
    #[error("User id must be non-zero")]
    ZeroUserId,

    /// The bearer token is empty
    #[error("Bearer token is empty")]
    EmptyToken,

    /// The bearer token contains characters that cannot travel in a query string
    #[error("Bearer token contains whitespace or control characters")]
    MalformedToken,
}

/// Convenience type alias for Results using TransportError.
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transport_error_display() {
        let error = TransportError::InvalidEndpoint("missing host".to_string());
        assert_eq!(error.to_string(), "Invalid endpoint: missing host");

        let error = TransportError::Rejected {
            status: 1008,
            reason: "policy violation".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Handshake rejected (1008): policy violation"
        );

        let error = TransportError::Timeout(Duration::from_secs(5));
        assert_eq!(error.to_string(), "Handshake timed out after 5s");

        let error = TransportError::FrameTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert!(error.to_string().contains("2048"));
        assert!(error.to_string().contains("1024"));
    }

    #[test]
    fn test_identity_error_display() {
        assert_eq!(
            IdentityError::ZeroUserId.to_string(),
            "User id must be non-zero"
        );
        assert_eq!(IdentityError::EmptyToken.to_string(), "Bearer token is empty");
        assert!(IdentityError::MalformedToken
            .to_string()
            .contains("whitespace"));
    }
}
