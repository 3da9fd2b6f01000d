//! Connector and channel traits the broker is written against.

use async_trait::async_trait;

use crate::error::Result;
use crate::frame::InboundFrame;
use crate::identity::SessionIdentity;

/// Opens push channels for a session identity.
///
/// Implementations perform the whole handshake in `connect`: the returned
/// channel is authenticated and ready to yield frames.
///
/// # Thread Safety
///
/// Connectors are shared between connection attempts and must be
/// `Send + Sync`.
#[async_trait]
pub trait PushConnector: Send + Sync + 'static {
    /// Establish a channel bound to `identity`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Rejected` when the server refuses the
    /// credentials, `TransportError::Timeout` or `TransportError::Handshake`
    /// for everything else that prevents the channel from opening.
    async fn connect(&self, identity: &SessionIdentity) -> Result<Box<dyn PushChannel>>;
}

/// An open, authenticated push channel.
#[async_trait]
pub trait PushChannel: Send {
    /// Wait for the next inbound frame.
    ///
    /// Returns `None` once the server has closed the channel. Any `Err`
    /// means the channel is unusable.
    async fn next_frame(&mut self) -> Option<Result<InboundFrame>>;

    /// Close the channel gracefully. Errors are swallowed since the channel
    /// is being discarded either way.
    async fn close(&mut self);
}
