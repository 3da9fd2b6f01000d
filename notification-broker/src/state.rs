//! Connection lifecycle states.

use std::fmt;
use std::time::Duration;

/// Lifecycle state of the broker's push connection.
///
/// ```text
///  Idle ──connect──▶ Connecting ──ok──▶ Open
///                        │               │ loss
///                        └──fail──▶ Reconnecting ◀─┘
///  any active state ──disconnect──▶ Closed ──connect──▶ Connecting
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConnectionState {
    /// No connection has been requested yet
    #[default]
    Idle,
    /// First handshake in flight
    Connecting,
    /// Channel open, events flowing
    Open,
    /// Waiting to retry, or retrying, after a failure
    Reconnecting {
        /// Retry number since the last successful handshake, starting at 1
        attempt: u32,
        /// Backoff delay chosen for this retry
        retry_in: Duration,
        /// Why the previous attempt ended
        last_error: String,
    },
    /// Explicitly disconnected
    Closed,
}

impl ConnectionState {
    /// Whether a connection task exists for this state
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Reconnecting { .. }
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting { .. } => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Reconnecting {
                attempt,
                retry_in,
                last_error,
            } => write!(
                f,
                "reconnecting (attempt {attempt}, retry in {retry_in:?}): {last_error}"
            ),
            other => f.write_str(other.name()),
        }
    }
}
