//! Mock 订阅者
//!
//! 记录收到的消息，可注入发送失败或延迟，用于无网络的测试。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::BroadcastError;
use crate::subscriber::Subscriber;

/// Mock subscriber
#[derive(Default)]
pub struct MockSubscriber {
    peer: String,
    attempts: AtomicU64,
    received: Mutex<Vec<String>>,
    fail: AtomicBool,
    delay: Option<Duration>,
    closed: AtomicBool,
}

impl MockSubscriber {
    /// 正常接收的订阅者
    pub fn new(peer: &str) -> Self {
        Self {
            peer: peer.to_string(),
            ..Default::default()
        }
    }

    /// 每次发送都失败的订阅者
    pub fn failing(peer: &str) -> Self {
        let subscriber = Self::new(peer);
        subscriber.fail.store(true, Ordering::SeqCst);
        subscriber
    }

    /// 每次发送前等待 `delay`
    pub fn slow(peer: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(peer)
        }
    }

    /// 切换失败注入
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Send attempts so far (successful or not)
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Messages delivered successfully
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Subscriber for MockSubscriber {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&self, text: &str) -> Result<(), BroadcastError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(BroadcastError::Closed {
                peer: self.peer.clone(),
            });
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(BroadcastError::send(&self.peer, "mock failure"));
        }
        self.received.lock().push(text.to_string());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
