//! Subscriber - one live consumer of broadcast messages

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::BroadcastError;

/// A connected subscriber
///
/// Implementations must tolerate `send` and `close` being called concurrently.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Peer label for logs
    fn peer(&self) -> &str;

    /// Deliver one text message
    async fn send(&self, text: &str) -> Result<(), BroadcastError>;

    /// Close the connection (best effort)
    async fn close(&self);
}

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// WebSocket subscriber (write half of an accepted connection)
pub struct WsSubscriber {
    peer: String,
    sink: Mutex<WsSink>,
}

impl WsSubscriber {
    pub fn new(peer: impl Into<String>, sink: WsSink) -> Self {
        Self {
            peer: peer.into(),
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Subscriber for WsSubscriber {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&self, text: &str) -> Result<(), BroadcastError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::text(text.to_owned()))
            .await
            .map_err(|e| BroadcastError::send(&self.peer, e.to_string()))
    }

    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }
}
