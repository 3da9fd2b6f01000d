use thiserror::Error;

/// Errors that can occur in the session controller
#[derive(Error, Debug)]
pub enum SessionError {
    /// The broker refused the operation (invalid identity, bad configuration)
    #[error("Notification broker error: {0}")]
    Broker(#[from] notification_broker::BrokerError),

    /// Invalid session configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SessionError {
    /// Whether the error means the session credentials are unusable and the
    /// user should be logged out
    pub fn is_invalid_identity(&self) -> bool {
        matches!(
            self,
            SessionError::Broker(notification_broker::BrokerError::InvalidIdentity(_))
        )
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use notification_broker::{BrokerError, IdentityError};

    #[test]
    fn test_error_display() {
        let error = SessionError::from(BrokerError::InvalidIdentity(IdentityError::EmptyToken));
        assert_eq!(
            error.to_string(),
            "Notification broker error: Invalid identity: Bearer token is empty"
        );
        assert!(error.is_invalid_identity());

        let error = SessionError::Configuration("feed capacity must be greater than 0".into());
        assert!(!error.is_invalid_identity());
    }
}
