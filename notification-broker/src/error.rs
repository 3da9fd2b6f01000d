//! Error types for the notification-broker crate.

use push_client::IdentityError;

/// Errors returned synchronously by broker operations.
///
/// Transport failures are deliberately absent: they are recovered by the
/// reconnect loop and only show up in [`crate::ConnectionState::Reconnecting`].
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The identity passed to `connect` was refused before any network activity
    #[error("Invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The broker was created outside a Tokio runtime
    #[error("No Tokio runtime available; create the broker from within a runtime or pass a handle")]
    NoRuntime,
}

/// Error returned by a listener that could not handle an event.
///
/// The broker logs it and moves on to the next listener.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for ListenerError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(format!("payload decode failed: {error}"))
    }
}

/// Convenience type alias for Results using BrokerError.
pub type Result<T> = std::result::Result<T, BrokerError>;
