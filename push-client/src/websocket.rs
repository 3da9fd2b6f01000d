//! WebSocket implementation of the push connector.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::channel::{PushChannel, PushConnector};
use crate::config::PushClientConfig;
use crate::error::{Result, TransportError};
use crate::frame::{self, InboundFrame};
use crate::identity::SessionIdentity;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to `ws://host/ws/{user_id}?token=...`.
///
/// The backend authenticates after accepting the upgrade and closes with
/// code 1008 when the token is refused. `connect` therefore waits up to
/// [`PushClientConfig::auth_window`] for that refusal before handing out the
/// channel, so a bad token fails the handshake with
/// [`TransportError::Rejected`] just like an HTTP 401 does. A refusal that
/// arrives later is reported by [`PushChannel::next_frame`].
///
/// # Example
///
/// ```no_run
/// use push_client::{
///     PushChannel, PushClientConfig, PushConnector, PushEndpoint, SessionIdentity, WebSocketConnector,
/// };
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PushClientConfig::new()
///     .with_endpoint(PushEndpoint::parse("http://localhost:8000")?);
/// let connector = WebSocketConnector::new(config)?;
///
/// let identity = SessionIdentity::new(42, "jwt-token")?;
/// let mut channel = connector.connect(&identity).await?;
/// while let Some(frame) = channel.next_frame().await {
///     println!("{:?}", frame?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    config: PushClientConfig,
}

impl WebSocketConnector {
    /// Create a connector after validating its configuration
    pub fn new(config: PushClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PushClientConfig {
        &self.config
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    async fn connect(&self, identity: &SessionIdentity) -> Result<Box<dyn PushChannel>> {
        let url = self.config.endpoint.session_url(identity)?;
        tracing::debug!(
            user_id = %identity.user_id(),
            endpoint = self.config.endpoint.as_str(),
            "Opening push channel"
        );

        let timeout = self.config.connect_timeout;
        let stream = match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
            Err(_) => return Err(TransportError::Timeout(timeout)),
            Ok(Err(tungstenite::Error::Http(response))) => {
                let status = response.status();
                return Err(TransportError::Rejected {
                    status: status.as_u16(),
                    reason: status
                        .canonical_reason()
                        .unwrap_or("HTTP error")
                        .to_string(),
                });
            }
            Ok(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
            Ok(Ok((stream, _response))) => stream,
        };

        let mut channel = WebSocketChannel {
            stream,
            max_frame_bytes: self.config.max_frame_bytes,
            pending: None,
        };
        channel.await_admission(self.config.auth_window).await?;
        Ok(Box::new(channel))
    }
}

/// Channel over an upgraded WebSocket stream
pub struct WebSocketChannel {
    stream: WsStream,
    max_frame_bytes: usize,
    /// First message, read while waiting for admission
    pending: Option<Message>,
}

enum Step {
    Yield(Result<InboundFrame>),
    Skip,
    End,
}

impl WebSocketChannel {
    /// Give the server `window` to refuse the session. Silence, or any
    /// message other than a close, admits it.
    async fn await_admission(&mut self, window: Duration) -> Result<()> {
        if window.is_zero() {
            return Ok(());
        }

        let first = match tokio::time::timeout(window, self.stream.next()).await {
            Err(_) => return Ok(()),
            Ok(first) => first,
        };

        match first {
            None => Err(TransportError::Handshake(
                "Channel closed during handshake".to_string(),
            )),
            Some(Err(e)) => Err(TransportError::Handshake(e.to_string())),
            Some(Ok(Message::Close(close))) => Err(match close {
                Some(close) if close.code == CloseCode::Policy => TransportError::Rejected {
                    status: u16::from(close.code),
                    reason: close.reason.as_str().to_string(),
                },
                Some(close) => TransportError::Handshake(format!(
                    "Channel closed during handshake ({}): {}",
                    u16::from(close.code),
                    close.reason.as_str()
                )),
                None => TransportError::Handshake("Channel closed during handshake".to_string()),
            }),
            Some(Ok(message)) => {
                self.pending = Some(message);
                Ok(())
            }
        }
    }

    fn translate(&self, message: Message) -> Step {
        let decoded = match message {
            Message::Text(text) => frame::decode_text(text.as_str(), self.max_frame_bytes),
            Message::Binary(data) => frame::decode_binary(&data, self.max_frame_bytes),
            // tungstenite queues the pong itself
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Step::Skip,
            Message::Close(Some(close)) if close.code == CloseCode::Policy => {
                return Step::Yield(Err(TransportError::Rejected {
                    status: u16::from(close.code),
                    reason: close.reason.as_str().to_string(),
                }));
            }
            Message::Close(close) => {
                if let Some(close) = close {
                    tracing::debug!(
                        code = u16::from(close.code),
                        reason = close.reason.as_str(),
                        "Push channel closed by server"
                    );
                }
                return Step::End;
            }
        };

        match decoded {
            Ok(InboundFrame::Keepalive) => Step::Skip,
            Ok(frame) => Step::Yield(Ok(frame)),
            Err(TransportError::FrameTooLarge { size, limit }) => {
                tracing::warn!(size, limit, "Dropping oversized push frame");
                Step::Skip
            }
            Err(e) => Step::Yield(Err(e)),
        }
    }
}

#[async_trait]
impl PushChannel for WebSocketChannel {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame>> {
        loop {
            let message = match self.pending.take() {
                Some(message) => message,
                None => match self.stream.next().await? {
                    Ok(message) => message,
                    Err(e) => return Some(Err(TransportError::ConnectionLost(e.to_string()))),
                },
            };

            match self.translate(message) {
                Step::Yield(frame) => return Some(frame),
                Step::Skip => continue,
                Step::End => return None,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("Push channel close failed: {}", e);
        }
    }
}
