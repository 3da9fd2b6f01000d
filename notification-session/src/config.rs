//! Session controller configuration

use crate::error::{Result, SessionError};

/// Configuration for the SessionController
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Most recent feed entries kept; older ones are dropped
    /// Default: 200
    pub feed_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { feed_capacity: 200 }
    }
}

impl SessionConfig {
    /// Create a new SessionConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.feed_capacity == 0 {
            return Err(SessionError::Configuration(
                "Feed capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
