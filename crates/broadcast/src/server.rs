//! WsServer - WebSocket accept loop
//!
//! 每个连接：握手 → 注册 WsSubscriber → 读取入站消息 (仅记录日志)。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::BroadcastError;
use crate::registry::{SubscriberId, SubscriberRegistry};
use crate::subscriber::WsSubscriber;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Totals of a server run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerReport {
    /// Completed WebSocket handshakes
    pub accepted: u64,
    /// Failed or timed-out handshakes
    pub handshake_failures: u64,
}

/// WebSocket broadcast server
#[derive(Debug)]
pub struct WsServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl WsServer {
    /// Bind the listener (fatal on failure)
    pub async fn bind(addr: &str) -> Result<Self, BroadcastError> {
        let bind_err = |source| BroadcastError::Bind {
            address: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        info!(address = %local_addr, "broadcast server bound");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept subscribers until shutdown is signalled.
    ///
    /// Connections still open at shutdown stay registered; closing them is
    /// left to [`SubscriberRegistry::close_all`].
    #[instrument(name = "broadcast_serve", skip_all, fields(address = %self.local_addr))]
    pub async fn serve(
        self,
        registry: SubscriberRegistry,
        mut shutdown: watch::Receiver<bool>,
    ) -> ServerReport {
        let mut report = ServerReport::default();
        let mut connections: JoinSet<bool> = JoinSet::new();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    match joined {
                        Ok(true) => report.accepted += 1,
                        Ok(false) => report.handshake_failures += 1,
                        Err(e) => warn!(error = %e, "connection task failed"),
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "incoming broadcast connection");
                        connections.spawn(handle_connection(
                            stream,
                            peer,
                            registry.clone(),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        warn!(error = %e, "broadcast accept failed");
                    }
                }
            }
        }

        info!(
            accepted = report.accepted,
            open = connections.len(),
            "broadcast server stopped accepting"
        );
        // Readers exit on the same signal; their write halves stay registered.
        while let Some(joined) = connections.join_next().await {
            match joined {
                Ok(true) => report.accepted += 1,
                Ok(false) => report.handshake_failures += 1,
                Err(e) => warn!(error = %e, "connection task failed"),
            }
        }
        report
    }
}

/// Handshake, register and read inbound messages.
///
/// Returns whether the handshake succeeded.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: SubscriberRegistry,
    mut shutdown: watch::Receiver<bool>,
) -> bool {
    let _ = stream.set_nodelay(true);
    let ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            warn!(peer = %peer, error = %e, "websocket handshake failed");
            return false;
        }
        Err(_) => {
            warn!(peer = %peer, "websocket handshake timed out");
            return false;
        }
    };

    let (sink, mut inbound) = ws.split();
    let id = registry.register(Arc::new(WsSubscriber::new(peer.to_string(), sink)));

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                // Left registered for close_all.
                return true;
            }
            message = inbound.next() => match message {
                Some(Ok(Message::Text(text))) => log_inbound(id, text.as_str()),
                Some(Ok(Message::Binary(data))) => {
                    trace!(subscriber = %id, bytes = data.len(), "ignoring binary message");
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(subscriber = %id, peer = %peer, "subscriber disconnected");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(subscriber = %id, peer = %peer, error = %e, "subscriber read failed");
                    break;
                }
            }
        }
    }

    registry.unregister(id);
    true
}

/// Inbound messages have no pipeline effect
fn log_inbound(id: SubscriberId, text: &str) {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) if value.get("type").and_then(|t| t.as_str()) == Some("gyro") => {
            debug!(
                subscriber = %id,
                x = ?value.get("x"),
                y = ?value.get("y"),
                z = ?value.get("z"),
                "inbound gyro message"
            );
        }
        Ok(_) => trace!(subscriber = %id, "inbound message ignored"),
        Err(e) => debug!(subscriber = %id, error = %e, "inbound message is not JSON"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::BroadcastService;
    use contracts::Sample;
    use futures_util::SinkExt;
    use tokio_tungstenite::connect_async;

    async fn wait_for_len(registry: &SubscriberRegistry, len: usize) {
        for _ in 0..200 {
            if registry.len() == len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {len} subscribers");
    }

    #[tokio::test]
    async fn test_bind_conflict_is_error() {
        let server = WsServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().to_string();
        assert!(matches!(
            WsServer::bind(&addr).await,
            Err(BroadcastError::Bind { .. })
        ));
    }

    #[tokio::test]
    async fn test_client_receives_broadcast() {
        let server = WsServer::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", server.local_addr());
        let registry = SubscriberRegistry::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let serve = tokio::spawn(server.serve(registry.clone(), shutdown_rx));

        let (mut client, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_len(&registry, 1).await;

        client
            .send(Message::text(r#"{"type":"gyro","x":1,"y":2,"z":3}"#.to_owned()))
            .await
            .unwrap();

        let service = BroadcastService::new(registry.clone(), Some(Duration::from_secs(1)));
        let report = service.fan_out(&Sample::new(1, 0.5, -0.5, 1.0)).await;
        assert_eq!(report.delivered, 1);

        let message = client.next().await.unwrap().unwrap();
        assert_eq!(
            message.into_text().unwrap().as_str(),
            r#"{"type":"gyro","x":0.5,"y":-0.5,"z":1.0}"#
        );

        client.close(None).await.unwrap();
        wait_for_len(&registry, 0).await;

        shutdown_tx.send(true).unwrap();
        let report = serve.await.unwrap();
        assert_eq!(report.accepted, 1);
    }

    #[tokio::test]
    async fn test_shutdown_leaves_subscribers_for_close_all() {
        let server = WsServer::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", server.local_addr());
        let registry = SubscriberRegistry::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let serve = tokio::spawn(server.serve(registry.clone(), shutdown_rx));

        let (mut client, _) = connect_async(url.as_str()).await.unwrap();
        wait_for_len(&registry, 1).await;

        shutdown_tx.send(true).unwrap();
        serve.await.unwrap();
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.close_all().await, 1);
        let closed = client.next().await;
        assert!(matches!(closed, Some(Ok(Message::Close(_))) | None));
    }
}
