//! # Persistence
//!
//! 批量持久化模块。
//!
//! 负责：
//! - 从持久化路径按到达顺序取样本，攒满 `batch_size` 后一次多行写入
//! - 写入失败：有限次指数退避重试，之后写入死信文件或丢弃，循环继续
//! - 路径关闭时写入剩余的部分批次并关闭存储
//!
//! ## Usage Example
//!
//! ```ignore
//! use persistence::{BatchWriter, ConfiguredStore, WriterConfig};
//!
//! let store = ConfiguredStore::connect(&blueprint.persistence).await?;
//! store.prepare(&table, blueprint.persistence.create_table).await?;
//! let writer = BatchWriter::new(store, target, WriterConfig::from(&blueprint.persistence));
//! let report = writer.run(persistence_rx).await?;
//! ```

mod buffer;
mod dead_letter;
mod error;
pub mod mock;
mod retry;
mod stores;
mod writer;

pub use buffer::BatchBuffer;
pub use contracts::{PersistenceTarget, SampleStore, TableName};
pub use dead_letter::{DeadLetterEntry, DeadLetterLog};
pub use error::{PersistenceError, Result};
pub use retry::RetryPolicy;
pub use stores::{create_table_sql, ConfiguredStore, LogStore, MySqlStore};
pub use writer::{BatchWriter, WriterConfig, WriterReport, WriterState};
