//! Test helpers: a loopback WebSocket push server.
//!
//! The server speaks the backend's protocol: clients connect to
//! `/ws/{user_id}?token=...`, receive one text frame per notification and may
//! be closed with code 1008 when their token is refused.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

pub const WAIT: Duration = Duration::from_secs(5);

enum Command {
    Text(String),
    Close(Option<CloseFrame>),
    Abort,
}

/// Loopback push server accepting any number of clients
pub struct PushServer {
    pub base_url: String,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    accept_task: JoinHandle<()>,
}

impl PushServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (conn_tx, connections) = mpsc::unbounded_channel();

        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let conn_tx = conn_tx.clone();
                tokio::spawn(async move {
                    let (uri_tx, uri_rx) = std::sync::mpsc::channel();
                    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        let _ = uri_tx.send(req.uri().to_string());
                        Ok(resp)
                    };
                    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                        return;
                    };
                    let uri = uri_rx.recv().unwrap_or_default();

                    let (command_tx, command_rx) = mpsc::unbounded_channel();
                    let (closed_tx, closed_rx) = watch::channel(false);
                    let _ = conn_tx.send(ServerConnection {
                        uri,
                        commands: command_tx,
                        client_closed: closed_rx,
                    });
                    serve(ws, command_rx, closed_tx).await;
                });
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            connections,
            accept_task,
        }
    }

    /// Wait for the next client to complete the upgrade
    pub async fn next_connection(&mut self) -> ServerConnection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("Timeout waiting for client")
            .expect("Accept loop stopped")
    }
}

impl Drop for PushServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve(
    mut ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    closed_tx: watch::Sender<bool>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Text(text)) => {
                    if ws.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Command::Close(frame)) => {
                    let _ = ws.close(frame).await;
                    // Drain until the client acknowledges
                    while let Some(Ok(_)) = ws.next().await {}
                    break;
                }
                Some(Command::Abort) | None => break,
            },
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    closed_tx.send_replace(true);
}

/// Server side of one client connection
pub struct ServerConnection {
    pub uri: String,
    commands: mpsc::UnboundedSender<Command>,
    client_closed: watch::Receiver<bool>,
}

impl ServerConnection {
    pub fn send_text(&self, text: &str) {
        let _ = self.commands.send(Command::Text(text.to_string()));
    }

    pub fn send_json(&self, value: &serde_json::Value) {
        self.send_text(&value.to_string());
    }

    /// Close with 1008, as the backend does for a bad token
    pub fn reject_token(&self) {
        let _ = self.commands.send(Command::Close(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: "invalid token".into(),
        })));
    }

    /// Drop the TCP stream without a close handshake
    pub fn abort(&self) {
        let _ = self.commands.send(Command::Abort);
    }

    /// Wait until the connection has ended, whoever ended it
    pub async fn wait_closed(&mut self) {
        tokio::time::timeout(WAIT, self.client_closed.wait_for(|closed| *closed))
            .await
            .expect("Timeout waiting for close")
            .expect("Server task dropped");
    }
}
