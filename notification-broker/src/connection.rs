//! Connection task: handshake, read loop and reconnect with backoff
//!
//! One task runs per `connect`. It owns the push channel for its whole life
//! and exits only when cancelled; transport failures loop back into the
//! backoff sleep. Every state change and every delivery is conditioned on the
//! task's epoch still being the broker's current one.
//!
//! The attempt counter counts consecutive failures. It resets when an open
//! channel is lost, but not when the server refuses the session on a channel
//! it had accepted.

use std::sync::Arc;
use tokio::sync::watch;

use push_client::{InboundFrame, PushChannel, PushConnector, SessionIdentity, TransportError};

use crate::broker::Shared;
use crate::config::BrokerConfig;
use crate::event::NotificationEvent;
use crate::state::ConnectionState;

pub(crate) struct ConnectionTask {
    pub(crate) shared: Arc<Shared>,
    pub(crate) connector: Arc<dyn PushConnector>,
    pub(crate) identity: SessionIdentity,
    pub(crate) epoch: u64,
    pub(crate) config: BrokerConfig,
    pub(crate) cancel: watch::Receiver<bool>,
}

enum PumpExit {
    Cancelled,
    Lost(String),
    /// The server refused the session after accepting the channel
    Rejected(String),
}

/// Resolves once the task is retired. A dropped sender counts as retired.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|retired| *retired).await;
}

impl ConnectionTask {
    pub(crate) async fn run(self) {
        let ConnectionTask {
            shared,
            connector,
            identity,
            epoch,
            config,
            mut cancel,
        } = self;
        let user_id = identity.user_id();
        let mut attempt: u32 = 0;

        loop {
            let handshake = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    tracing::debug!(%user_id, epoch, "Connection retired during handshake");
                    return;
                }
                result = tokio::time::timeout(config.handshake_timeout, connector.connect(&identity)) => result,
            };

            let failure = match handshake {
                Ok(Ok(mut channel)) => {
                    if !shared.transition(epoch, ConnectionState::Open) {
                        close_channel(channel.as_mut(), &config).await;
                        return;
                    }
                    shared.stats.record_open();
                    tracing::info!(%user_id, epoch, "Push channel open");

                    match pump(&shared, epoch, channel.as_mut(), &mut cancel).await {
                        PumpExit::Cancelled => {
                            close_channel(channel.as_mut(), &config).await;
                            tracing::info!(%user_id, epoch, "Push channel closed");
                            return;
                        }
                        PumpExit::Lost(reason) => {
                            attempt = 0;
                            reason
                        }
                        // A refusal is a failed handshake; keep backing off
                        PumpExit::Rejected(reason) => reason,
                    }
                }
                Ok(Err(error)) => error.to_string(),
                Err(_) => format!(
                    "Handshake timed out after {:?}",
                    config.handshake_timeout
                ),
            };

            attempt = attempt.saturating_add(1);
            let retry_in = config.backoff.delay_for_attempt(attempt);
            tracing::warn!(
                %user_id,
                epoch,
                attempt,
                ?retry_in,
                error = %failure,
                "Push channel unavailable, scheduling reconnect"
            );

            let reconnecting = ConnectionState::Reconnecting {
                attempt,
                retry_in,
                last_error: failure,
            };
            if !shared.transition(epoch, reconnecting) {
                return;
            }
            shared.stats.record_retry();

            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    tracing::debug!(%user_id, epoch, "Reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(retry_in) => {}
            }
        }
    }
}

/// Read frames and fan them out until the channel fails or the task is retired.
async fn pump(
    shared: &Shared,
    epoch: u64,
    channel: &mut dyn PushChannel,
    cancel: &mut watch::Receiver<bool>,
) -> PumpExit {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancelled(cancel) => return PumpExit::Cancelled,
            frame = channel.next_frame() => frame,
        };

        let payload = match frame {
            None => return PumpExit::Lost("Channel closed by server".to_string()),
            Some(Err(error @ TransportError::Rejected { .. })) => {
                return PumpExit::Rejected(error.to_string())
            }
            Some(Err(error)) => return PumpExit::Lost(error.to_string()),
            Some(Ok(InboundFrame::Keepalive)) => continue,
            Some(Ok(InboundFrame::Event(payload))) => payload,
        };

        let event = NotificationEvent::new(payload, shared.stats.record_received());
        tracing::debug!(
            epoch,
            sequence = event.sequence(),
            kind = event.kind().unwrap_or("-"),
            "Dispatching notification"
        );

        let report = shared
            .registry
            .fan_out(&event, || shared.is_current(epoch));
        shared.stats.record_delivery(&report);
        if report.interrupted {
            return PumpExit::Cancelled;
        }
    }
}

async fn close_channel(channel: &mut dyn PushChannel, config: &BrokerConfig) {
    if tokio::time::timeout(config.close_timeout, channel.close())
        .await
        .is_err()
    {
        tracing::debug!("Graceful close timed out after {:?}", config.close_timeout);
    }
}
