//! Websocket connection to the relay.

use anyhow::{anyhow, Context, Result};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use shared::{
    domain::validate_username,
    protocol::{self, ChatMessage},
};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const INBOUND_BUFFER: usize = 64;

/// Builds `ws://{server}/ws/{identity}`. `server` may be a bare `host:port`
/// or carry a `ws`, `wss`, `http` or `https` scheme.
pub fn websocket_url(server: &str, identity: &str) -> Result<Url> {
    let server = server.trim().trim_end_matches('/');
    if server.is_empty() {
        return Err(anyhow!("server address is empty"));
    }

    let base = if let Some(rest) = server.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if server.starts_with("ws://") || server.starts_with("wss://") {
        server.to_string()
    } else if server.contains("://") {
        return Err(anyhow!("unsupported scheme in server address '{server}'"));
    } else {
        format!("ws://{server}")
    };

    validate_username(identity)?;
    Url::parse(&format!("{base}/ws/{identity}"))
        .with_context(|| format!("invalid server address '{server}'"))
}

/// Write half of a relay connection.
pub struct ChatHandle {
    identity: String,
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
}

/// Decoded messages arriving from the relay. Yields `None` once the
/// connection is gone.
pub struct Inbound {
    rx: mpsc::Receiver<ChatMessage>,
}

impl Inbound {
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        self.rx.recv().await
    }
}

impl ChatHandle {
    pub async fn connect(identity: &str, server: &str) -> Result<(Self, Inbound)> {
        let url = websocket_url(server, identity)?;
        let (ws_stream, response) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {url}"))?;
        debug!(status = %response.status(), %url, "websocket handshake completed");

        let (sink, stream) = ws_stream.split();
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        let reader = tokio::spawn(read_frames(stream, tx));

        Ok((
            Self {
                identity: identity.to_string(),
                sink,
                reader,
            },
            Inbound { rx },
        ))
    }

    pub async fn send_text(&mut self, receiver: &str, text: &str) -> Result<()> {
        let message = ChatMessage::prompt(&self.identity, receiver, text);
        debug!(to = receiver, "sending prompt");
        self.send(&message).await
    }

    pub async fn list_users(&mut self) -> Result<()> {
        self.send(&ChatMessage::get_users_list()).await
    }

    /// Sends a websocket close frame; the relay releases the identity.
    pub async fn close(&mut self) -> Result<()> {
        self.sink
            .send(Message::Close(None))
            .await
            .context("failed to send close frame")
    }

    async fn send(&mut self, message: &ChatMessage) -> Result<()> {
        let text = protocol::encode(message)?;
        self.sink
            .send(Message::Text(text))
            .await
            .context("failed to write websocket frame")
    }
}

impl Drop for ChatHandle {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_frames(mut stream: SplitStream<WsStream>, tx: mpsc::Sender<ChatMessage>) {
    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(Message::Text(text)) => match protocol::decode(&text) {
                Ok(message) => message,
                Err(err) => {
                    warn!(%err, "dropping undecodable frame from relay");
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!(%err, "websocket receive failed");
                break;
            }
        };
        if message.is_close() {
            break;
        }
        if tx.send(message).await.is_err() {
            break;
        }
    }
    debug!("relay stream ended");
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
