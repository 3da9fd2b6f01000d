//! # Notification Session
//!
//! Ties a login session to the realtime notification broker and keeps the
//! session's notification feed.
//!
//! ## Overview
//!
//! - On login, [`SessionController::start_session`] registers one listener
//!   with the broker and connects with the user's id and token.
//! - Every event is folded into a bounded, newest-first feed. Payloads in the
//!   backend's shape become [`Notification`]s; anything else is kept as
//!   [`FeedEntry::Raw`].
//! - On logout, [`SessionController::end_session`] removes the listener,
//!   disconnects and clears the feed. Dropping the controller does the same.
//!
//! UI code watches [`SessionController::watch_feed`] and re-reads
//! [`SessionController::notifications`] whenever it changes.

pub mod config;
pub mod controller;
pub mod error;
pub mod feed;
pub mod notification;

// Re-export main types for convenience
pub use config::SessionConfig;
pub use controller::SessionController;
pub use error::{Result, SessionError};
pub use feed::FeedEntry;
pub use notification::{Notification, NotificationSender};

// Re-export commonly used types from dependencies
pub use notification_broker::{BrokerConfig, ConnectionState, NotificationBroker, UserId};
