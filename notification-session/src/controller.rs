//! Session controller
//!
//! Binds a login session to the notification broker: starting a session
//! registers one feed listener and connects; ending it removes the listener,
//! disconnects and clears the feed.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use notification_broker::{
    BrokerError, ConnectionState, ListenerHandle, NotificationBroker, UserId,
};
use push_client::SessionIdentity;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::feed::{FeedEntry, NotificationFeed};

struct ActiveSession {
    user_id: UserId,
    listener: ListenerHandle,
}

/// Session-scoped owner of the notification feed.
///
/// # Example
///
/// ```rust,ignore
/// let broker = Arc::new(NotificationBroker::websocket(client_config, BrokerConfig::default())?);
/// let session = SessionController::new(broker, SessionConfig::default())?;
///
/// // On login
/// session.start_session(user.id, &user.token)?;
///
/// // Re-render whenever the feed changes
/// let mut feed = session.watch_feed();
/// while feed.changed().await.is_ok() {
///     render(session.notifications());
/// }
///
/// // On logout
/// session.end_session();
/// ```
pub struct SessionController {
    broker: Arc<NotificationBroker>,
    feed: Arc<Mutex<NotificationFeed>>,
    revision: Arc<watch::Sender<u64>>,
    session: Mutex<Option<ActiveSession>>,
}

impl SessionController {
    pub fn new(broker: Arc<NotificationBroker>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let (revision, _) = watch::channel(0);
        Ok(Self {
            broker,
            feed: Arc::new(Mutex::new(NotificationFeed::new(config.feed_capacity))),
            revision: Arc::new(revision),
            session: Mutex::new(None),
        })
    }

    /// Start (or refresh) the session for `user_id`.
    ///
    /// A session for a different user is ended first. For the same user the
    /// existing feed listener is kept and the broker reconnects only if the
    /// token changed.
    ///
    /// The session lock is never held while the broker waits for an
    /// in-flight delivery, so listeners may read the controller meanwhile.
    ///
    /// # Errors
    ///
    /// Invalid credentials are returned so the caller can force a logout; no
    /// listener is left registered in that case.
    pub fn start_session(&self, user_id: u64, token: &str) -> Result<()> {
        // Fail before touching the current session
        let identity = SessionIdentity::new(user_id, token).map_err(BrokerError::from)?;
        let user_id = identity.user_id();
        let token = identity.token().expose();

        let previous = {
            let mut session = self.session.lock();
            if session.as_ref().is_some_and(|active| active.user_id == user_id) {
                drop(session);
                self.broker.connect(user_id.as_u64(), token)?;
                return Ok(());
            }
            session.take()
        };
        if let Some(previous) = previous {
            tracing::info!(user_id = %previous.user_id, "Ending previous session");
            self.teardown(previous);
        }

        let listener = {
            let feed = self.feed.clone();
            let revision = self.revision.clone();
            self.broker.add_listener(move |event| {
                feed.lock().push(FeedEntry::from_event(event));
                revision.send_modify(|rev| *rev += 1);
            })
        };

        if let Err(e) = self.broker.connect(user_id.as_u64(), token) {
            listener.remove();
            return Err(e.into());
        }

        tracing::info!(%user_id, "Session started");
        let replaced = self
            .session
            .lock()
            .replace(ActiveSession { user_id, listener });
        if let Some(stale) = replaced {
            // Another start_session raced this one; only one feed listener stays
            tracing::debug!(user_id = %stale.user_id, "Dropping concurrently started session");
            stale.listener.remove();
        }
        Ok(())
    }

    /// End the session: stop listening, disconnect and clear the feed.
    ///
    /// Returns false if no session was active.
    pub fn end_session(&self) -> bool {
        let Some(active) = self.session.lock().take() else {
            return false;
        };
        tracing::info!(user_id = %active.user_id, "Session ended");
        self.teardown(active);
        true
    }

    fn teardown(&self, active: ActiveSession) {
        active.listener.remove();
        self.broker.disconnect();
        self.clear_notifications();
    }

    /// Feed entries, newest first
    pub fn notifications(&self) -> Vec<FeedEntry> {
        self.feed.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.feed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear_notifications(&self) {
        self.feed.lock().clear();
        self.revision.send_modify(|rev| *rev += 1);
    }

    pub fn current_user(&self) -> Option<UserId> {
        self.session.lock().as_ref().map(|active| active.user_id)
    }

    /// Receiver whose value changes every time the feed changes
    pub fn watch_feed(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.broker.state()
    }

    pub fn broker(&self) -> &Arc<NotificationBroker> {
        &self.broker
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.end_session();
    }
}
