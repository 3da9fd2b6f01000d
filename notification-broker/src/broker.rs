//! Main NotificationBroker implementation
//!
//! The broker owns at most one push connection at a time and the ordered
//! listener registry. `connect` spawns a connection task bound to an epoch;
//! `disconnect` and identity changes retire that epoch, signal the task to
//! stop and then wait on the delivery gate, so no event from a retired
//! connection reaches a listener after they return.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;

use push_client::{PushClientConfig, PushConnector, SessionIdentity, UserId, WebSocketConnector};

use crate::config::BrokerConfig;
use crate::connection::ConnectionTask;
use crate::error::{BrokerError, Result};
use crate::event::NotificationEvent;
use crate::registry::{
    InfallibleListener, ListenerHandle, ListenerId, ListenerRegistry, NotificationListener,
};
use crate::state::ConnectionState;
use crate::stats::{BrokerStats, StatsCounters};

/// No connection task is ever assigned this epoch
const RETIRED: u64 = 0;

struct ActiveConnection {
    epoch: u64,
    cancel: watch::Sender<bool>,
}

impl ActiveConnection {
    fn retire(self) {
        self.cancel.send_replace(true);
    }
}

#[derive(Default)]
struct Control {
    identity: Option<SessionIdentity>,
    active: Option<ActiveConnection>,
}

/// State shared between the broker and its connection task
pub(crate) struct Shared {
    pub(crate) registry: Arc<ListenerRegistry>,
    pub(crate) stats: StatsCounters,
    control: Mutex<Control>,
    current_epoch: AtomicU64,
    next_epoch: AtomicU64,
    state_tx: watch::Sender<ConnectionState>,
}

impl Shared {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            registry: Arc::new(ListenerRegistry::new()),
            stats: StatsCounters::default(),
            control: Mutex::new(Control::default()),
            current_epoch: AtomicU64::new(RETIRED),
            next_epoch: AtomicU64::new(RETIRED + 1),
            state_tx,
        }
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch.load(Ordering::SeqCst) == epoch
    }

    /// Publish `state` on behalf of the task owning `epoch`.
    ///
    /// Returns false, publishing nothing, if that task has been retired.
    pub(crate) fn transition(&self, epoch: u64, state: ConnectionState) -> bool {
        let control = self.control.lock();
        match &control.active {
            Some(active) if active.epoch == epoch => {
                tracing::debug!(epoch, state = state.name(), "Connection state changed");
                self.state_tx.send_replace(state);
                true
            }
            _ => false,
        }
    }
}

/// Realtime notification broker.
///
/// Owns one push connection per session and fans every inbound event out to
/// the registered listeners in registration order.
///
/// All operations are synchronous and may be called from any thread,
/// including from inside a listener. Listener removal and `disconnect` block
/// while an event is being delivered on another thread, so they return only
/// once the guarantee they make actually holds.
///
/// # Example
///
/// ```no_run
/// use notification_broker::{BrokerConfig, NotificationBroker};
/// use push_client::PushClientConfig;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = NotificationBroker::websocket(PushClientConfig::default(), BrokerConfig::default())?;
///
/// let handle = broker.add_listener(|event| {
///     println!("{:?}: {}", event.kind(), event.payload());
/// });
/// broker.connect(42, "jwt-token")?;
///
/// // ... later, on logout
/// handle.remove();
/// broker.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct NotificationBroker {
    shared: Arc<Shared>,
    connector: Arc<dyn PushConnector>,
    config: BrokerConfig,
    runtime: Handle,
}

impl NotificationBroker {
    /// Create a broker on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// `BrokerError::NoRuntime` outside a runtime, `BrokerError::Configuration`
    /// if `config` does not validate.
    pub fn new(connector: impl PushConnector, config: BrokerConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| BrokerError::NoRuntime)?;
        Self::with_handle(connector, config, runtime)
    }

    /// Create a broker that spawns its connection tasks on `runtime`.
    pub fn with_handle(
        connector: impl PushConnector,
        config: BrokerConfig,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared::new()),
            connector: Arc::new(connector),
            config,
            runtime,
        })
    }

    /// Create a broker backed by the WebSocket push client.
    pub fn websocket(client_config: PushClientConfig, config: BrokerConfig) -> Result<Self> {
        let connector = WebSocketConnector::new(client_config)
            .map_err(|e| BrokerError::Configuration(e.to_string()))?;
        Self::new(connector, config)
    }

    /// Open the push connection for `(user_id, token)`.
    ///
    /// Returns as soon as the connection task is started; handshake failures
    /// are retried in the background and show up only in [`state`].
    /// Connecting again with the same identity while a connection is active
    /// is a no-op. A different identity replaces the current connection.
    ///
    /// # Errors
    ///
    /// `BrokerError::InvalidIdentity` if the user id is zero or the token is
    /// empty or malformed. State is left unchanged.
    ///
    /// [`state`]: NotificationBroker::state
    pub fn connect(&self, user_id: u64, token: impl Into<String>) -> Result<()> {
        let identity = SessionIdentity::new(user_id, token)?;

        let retired = {
            let mut control = self.shared.control.lock();
            if control.active.is_some() && control.identity.as_ref() == Some(&identity) {
                tracing::debug!(user_id, "Already connected for this identity");
                return Ok(());
            }

            let retired = control.active.take();
            let epoch = self.shared.next_epoch.fetch_add(1, Ordering::SeqCst);
            self.shared.current_epoch.store(epoch, Ordering::SeqCst);

            let (cancel_tx, cancel_rx) = watch::channel(false);
            control.identity = Some(identity.clone());
            control.active = Some(ActiveConnection {
                epoch,
                cancel: cancel_tx,
            });
            self.shared.state_tx.send_replace(ConnectionState::Connecting);

            let task = ConnectionTask {
                shared: self.shared.clone(),
                connector: self.connector.clone(),
                identity,
                epoch,
                config: self.config.clone(),
                cancel: cancel_rx,
            };
            self.runtime.spawn(task.run());
            tracing::info!(user_id, epoch, "Connecting push channel");
            retired
        };

        if let Some(old) = retired {
            tracing::debug!(old_epoch = old.epoch, "Replacing connection for new identity");
            old.retire();
            self.shared.registry.quiesce();
        }
        Ok(())
    }

    /// Register a listener. Never fails.
    pub fn add_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.register(Arc::new(InfallibleListener(callback)))
    }

    /// Register a listener that may report failures.
    pub fn register(&self, listener: Arc<dyn NotificationListener>) -> ListenerHandle {
        let id = self.shared.registry.register(listener);
        ListenerHandle::new(id, &self.shared.registry)
    }

    /// Remove the listener registered under `id`.
    ///
    /// Same guarantee as [`ListenerHandle::remove`].
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.registry.remove(id)
    }

    /// Close the connection and cancel any pending reconnect.
    ///
    /// Listeners stay registered. After this returns no event is delivered
    /// until the next `connect` opens a new channel. Idempotent.
    pub fn disconnect(&self) {
        let retired = {
            let mut control = self.shared.control.lock();
            control.identity = None;
            let retired = control.active.take();
            if retired.is_some() {
                self.shared.current_epoch.store(RETIRED, Ordering::SeqCst);
                self.shared.state_tx.send_replace(ConnectionState::Closed);
            }
            retired
        };

        match retired {
            Some(connection) => {
                let epoch = connection.epoch;
                connection.retire();
                self.shared.registry.quiesce();
                tracing::info!(epoch, "Disconnected");
            }
            None => tracing::debug!("Disconnect requested with no active connection"),
        }
    }

    /// Disconnect and drop every listener
    pub fn shutdown(&self) {
        self.disconnect();
        let removed = self.shared.registry.clear();
        tracing::debug!(removed, "Broker shut down");
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Subscribe to connection state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// User the broker is currently bound to, if any
    pub fn identity(&self) -> Option<UserId> {
        self.shared
            .control
            .lock()
            .identity
            .as_ref()
            .map(SessionIdentity::user_id)
    }

    pub fn listener_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn stats(&self) -> BrokerStats {
        self.shared.stats.snapshot(self.listener_count())
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

impl Drop for NotificationBroker {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for NotificationBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBroker")
            .field("state", &self.state())
            .field("identity", &self.identity())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
