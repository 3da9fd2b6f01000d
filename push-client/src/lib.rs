//! Push channel client for realtime notifications.
//!
//! This crate is the transport boundary of the notification subsystem. It knows
//! how to bind a session identity to the backend's push endpoint and how to turn
//! inbound frames into opaque JSON payloads. It knows nothing about listeners,
//! reconnection or session state; those live in `notification-broker`.
//!
//! # Overview
//!
//! - [`SessionIdentity`]: validated `(user id, bearer token)` pair.
//! - [`PushConnector`] / [`PushChannel`]: the seam the broker is written
//!   against. Tests substitute in-memory implementations.
//! - [`WebSocketConnector`]: the production connector, speaking to
//!   `ws://host/ws/{user_id}?token={token}`.
//! - [`InboundFrame`]: decoded frame, either an event payload or keepalive
//!   traffic.
//!
//! # Private Workspace Crate
//!
//! This crate is intended for internal use within the workspace and is not
//! published to crates.io.

mod channel;
mod config;
mod error;
pub mod frame;
mod identity;
mod websocket;

pub use channel::{PushChannel, PushConnector};
pub use config::{PushClientConfig, PushEndpoint};
pub use error::{IdentityError, Result, TransportError};
pub use frame::InboundFrame;
pub use identity::{BearerToken, SessionIdentity, UserId};
pub use websocket::{WebSocketChannel, WebSocketConnector};
