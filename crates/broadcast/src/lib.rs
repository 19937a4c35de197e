//! # Broadcast
//!
//! 实时广播模块。
//!
//! 负责：
//! - 维护订阅者集合 (`SubscriberRegistry`)
//! - WebSocket 服务端接入订阅者 (`WsServer`)
//! - 从广播路径取样本并并发推送给全部订阅者 (`BroadcastService`)
//! - 发送失败或超时的订阅者立即移除，不影响其他订阅者

mod error;
pub mod mock;
mod registry;
mod server;
mod service;
mod subscriber;

pub use error::BroadcastError;
pub use registry::{SubscriberId, SubscriberRegistry};
pub use server::{ServerReport, WsServer};
pub use service::{BroadcastReport, BroadcastService, BroadcastStats, FanoutReport};
pub use subscriber::{Subscriber, WsSubscriber};
