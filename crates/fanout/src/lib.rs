//! # Fanout
//!
//! 样本分流模块。
//!
//! 负责：
//! - 把每个解析出的样本交给广播与持久化两条路径
//! - 每条路径独立队列与溢出策略，慢消费者不阻塞另一条路径
//! - 发送端全部释放后关闭队列，作为消费者的结束信号

mod error;
mod metrics;
mod path;
mod router;

pub use contracts::{FanoutConfig, OverflowPolicy, PathConfig, Sample};
pub use error::FanoutError;
pub use metrics::{PathMetrics, PathSnapshot};
pub use path::{path, PathKind, PathReceiver, PathSender, SendOutcome};
pub use router::{FanoutMetrics, FanoutRouter, FanoutSnapshot, PublishOutcome};
