//! In-memory push connector for tests
//!
//! [`MockConnector`] scripts handshake outcomes and hands every accepted
//! channel to the test as a [`MockRemote`], which plays the server side:
//! it pushes events, drops the connection or closes it, and reports whether
//! the broker has closed its end.
//!
//! Available inside this crate's tests and, for other crates, behind the
//! `test-util` feature.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use push_client::{InboundFrame, PushChannel, PushConnector, SessionIdentity, TransportError};

/// What the next handshake does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Open a channel and hand its remote end to the test
    Accept,
    /// Fail with `TransportError::Rejected` (close code 1008)
    Reject(String),
    /// Never complete
    Hang,
}

enum RemoteSignal {
    Frame(InboundFrame),
    Fail(String),
    Reject(String),
    Close,
}

struct MockInner {
    script: Mutex<VecDeque<HandshakeOutcome>>,
    default_outcome: Mutex<HandshakeOutcome>,
    identities: Mutex<Vec<SessionIdentity>>,
    open: Arc<AtomicUsize>,
    remotes_tx: mpsc::UnboundedSender<MockRemote>,
    remotes_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockRemote>>,
}

/// Scriptable in-memory [`PushConnector`].
///
/// Clones share state, so a test keeps one clone and gives another to the
/// broker.
#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<MockInner>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// A connector that accepts every handshake
    pub fn new() -> Self {
        let (remotes_tx, remotes_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockInner {
                script: Mutex::new(VecDeque::new()),
                default_outcome: Mutex::new(HandshakeOutcome::Accept),
                identities: Mutex::new(Vec::new()),
                open: Arc::new(AtomicUsize::new(0)),
                remotes_tx,
                remotes_rx: tokio::sync::Mutex::new(remotes_rx),
            }),
        }
    }

    /// Queue outcomes for the next handshakes, in order
    pub fn script(&self, outcomes: impl IntoIterator<Item = HandshakeOutcome>) {
        self.inner.script.lock().extend(outcomes);
    }

    /// Outcome used once the script is exhausted
    pub fn set_default(&self, outcome: HandshakeOutcome) {
        *self.inner.default_outcome.lock() = outcome;
    }

    /// Wait for the next accepted channel
    pub async fn next_remote(&self) -> MockRemote {
        let mut remotes = self.inner.remotes_rx.lock().await;
        match remotes.recv().await {
            Some(remote) => remote,
            // The sender lives as long as the connector
            None => std::future::pending().await,
        }
    }

    /// Handshakes attempted so far, whatever their outcome
    pub fn handshake_count(&self) -> usize {
        self.inner.identities.lock().len()
    }

    /// Channels accepted and not yet dropped by the broker
    pub fn open_channels(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Identities presented at each handshake, in order
    pub fn identities(&self) -> Vec<SessionIdentity> {
        self.inner.identities.lock().clone()
    }
}

#[async_trait]
impl PushConnector for MockConnector {
    async fn connect(
        &self,
        identity: &SessionIdentity,
    ) -> push_client::Result<Box<dyn PushChannel>> {
        self.inner.identities.lock().push(identity.clone());
        let outcome = self
            .inner
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.inner.default_outcome.lock().clone());

        match outcome {
            HandshakeOutcome::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.inner.open.fetch_add(1, Ordering::SeqCst);
                let remote = MockRemote {
                    tx,
                    identity: identity.clone(),
                };
                let _ = self.inner.remotes_tx.send(remote);
                Ok(Box::new(MockChannel {
                    rx,
                    open: self.inner.open.clone(),
                }))
            }
            HandshakeOutcome::Reject(reason) => Err(TransportError::Rejected {
                status: 1008,
                reason,
            }),
            HandshakeOutcome::Hang => std::future::pending().await,
        }
    }
}

/// Server side of one accepted mock channel.
///
/// Dropping it ends the channel as if the server had closed it.
pub struct MockRemote {
    tx: mpsc::UnboundedSender<RemoteSignal>,
    identity: SessionIdentity,
}

impl MockRemote {
    /// Identity the channel was opened for
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Push an event. Returns false if the broker already closed the channel.
    pub fn send_event(&self, payload: Value) -> bool {
        self.tx
            .send(RemoteSignal::Frame(InboundFrame::Event(payload)))
            .is_ok()
    }

    pub fn send_keepalive(&self) -> bool {
        self.tx
            .send(RemoteSignal::Frame(InboundFrame::Keepalive))
            .is_ok()
    }

    /// Fail the channel with `TransportError::ConnectionLost`
    pub fn drop_connection(&self, reason: &str) {
        let _ = self.tx.send(RemoteSignal::Fail(reason.to_string()));
    }

    /// Refuse the session on the open channel, as the backend does with
    /// close code 1008 for a bad token
    pub fn reject(&self, reason: &str) {
        let _ = self.tx.send(RemoteSignal::Reject(reason.to_string()));
    }

    /// End the channel cleanly
    pub fn close_from_server(&self) {
        let _ = self.tx.send(RemoteSignal::Close);
    }

    /// Whether the broker has closed or dropped its end
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Wait until the broker closes or drops its end
    pub async fn wait_closed(&self) {
        self.tx.closed().await;
    }
}

struct MockChannel {
    rx: mpsc::UnboundedReceiver<RemoteSignal>,
    open: Arc<AtomicUsize>,
}

#[async_trait]
impl PushChannel for MockChannel {
    async fn next_frame(&mut self) -> Option<push_client::Result<InboundFrame>> {
        match self.rx.recv().await? {
            RemoteSignal::Frame(frame) => Some(Ok(frame)),
            RemoteSignal::Fail(reason) => Some(Err(TransportError::ConnectionLost(reason))),
            RemoteSignal::Reject(reason) => Some(Err(TransportError::Rejected {
                status: 1008,
                reason,
            })),
            RemoteSignal::Close => None,
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

impl Drop for MockChannel {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
