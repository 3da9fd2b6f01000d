//! # notification-broker
//!
//! Session-scoped realtime notification broker.
//!
//! A [`NotificationBroker`] owns at most one push connection, bound to the
//! identity passed to [`NotificationBroker::connect`], and fans every inbound
//! event out to its listeners in registration order. Listeners outlive
//! connections: they may be registered before the first `connect`, stay put
//! across reconnects and `disconnect`, and go away only when removed.
//!
//! Guarantees:
//!
//! - One connection at a time. Connecting again with the same identity is a
//!   no-op; a new identity replaces the old connection.
//! - After [`ListenerHandle::remove`] returns, that listener is never invoked
//!   again.
//! - After [`NotificationBroker::disconnect`] returns, no event is delivered
//!   until a new connection opens.
//! - A listener that fails or panics is logged and skipped.
//! - Lost connections are retried with capped exponential backoff
//!   ([`BackoffPolicy`]). Delivery is at-most-once: nothing is replayed for
//!   the gap.
//!
//! The transport is abstracted by [`push_client::PushConnector`]; the
//! production implementation is [`push_client::WebSocketConnector`].

mod broker;
mod config;
mod connection;
mod error;
mod event;
mod registry;
mod state;
mod stats;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use broker::NotificationBroker;
pub use config::{BackoffPolicy, BrokerConfig};
pub use error::{BrokerError, ListenerError, Result};
pub use event::NotificationEvent;
pub use registry::{ListenerGuard, ListenerHandle, ListenerId, NotificationListener};
pub use state::ConnectionState;
pub use stats::BrokerStats;

pub use push_client::{IdentityError, UserId};
