//! Outbound WebSocket connection to the relay server

use std::fmt;

use anyhow::{Context, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use ttylink_protocol::{codec, Message};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Dials the relay server
pub struct Connector {
    url: String,
}

impl Connector {
    /// Connector for a fixed relay endpoint (the URL carries the device id)
    pub fn new(url: String) -> Self {
        Self { url }
    }

    /// Relay endpoint this connector dials
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Attempt a single connection
    pub async fn connect(&self) -> Result<ActiveLink> {
        tracing::info!(state = %LinkState::Connecting, "Connecting to {}", self.url);

        let (ws, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", self.url))?;

        tracing::info!(state = %LinkState::Connected, "Connected");
        let (tx, rx) = ws.split();
        Ok(ActiveLink { tx, rx })
    }
}

/// An open control connection
pub struct ActiveLink {
    tx: SplitSink<WsStream, WsMessage>,
    rx: SplitStream<WsStream>,
}

impl ActiveLink {
    /// Encode and send one control message
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let text = codec::encode(message)?;
        self.tx
            .send(WsMessage::Text(text))
            .await
            .context("Failed to send frame")
    }

    /// Next decoded control message; `None` once the connection is gone.
    ///
    /// Malformed frames are logged and dropped, records without a `type`
    /// field are silently ignored. Neither affects the connection.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.rx.next().await {
                Some(Ok(WsMessage::Text(text))) => match codec::decode(&text) {
                    Ok(Some(message)) => return Some(message),
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::error!("Dropping malformed message: {}", e);
                        continue;
                    }
                },
                // Transport-level frames, not part of the control protocol
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => continue,
                Some(Ok(WsMessage::Binary(_))) => {
                    tracing::warn!("Ignoring unexpected binary frame");
                    continue;
                }
                Some(Ok(WsMessage::Close(_))) | None => return None,
                Some(Err(e)) => {
                    tracing::error!("Connection error: {}", e);
                    return None;
                }
            }
        }
    }

    /// Notify the peer and release the connection
    pub async fn close(mut self) {
        tracing::info!(state = %LinkState::Closing, "Closing connection");
        let _ = self.tx.send(WsMessage::Close(None)).await;
        let _ = self.tx.close().await;
    }
}
