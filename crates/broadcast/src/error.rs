//! Broadcast error types

use thiserror::Error;

/// Broadcast errors
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Delivery to one subscriber failed
    #[error("send to subscriber {peer} failed: {message}")]
    Send { peer: String, message: String },

    /// Delivery to one subscriber did not finish in time
    #[error("send to subscriber {peer} timed out after {timeout_ms} ms")]
    SendTimeout { peer: String, timeout_ms: u64 },

    /// Subscriber connection already closed
    #[error("subscriber {peer} is closed")]
    Closed { peer: String },

    /// Broadcast listener could not be bound (fatal)
    #[error("failed to bind broadcast server {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// WebSocket protocol error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Message serialization error
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BroadcastError {
    /// Create a send error
    pub fn send(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Send {
            peer: peer.into(),
            message: message.into(),
        }
    }
}
