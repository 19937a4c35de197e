//! PipelineBlueprint - Config Loader 输出
//!
//! 描述完整的管道配置：采集传输、分流队列、广播服务、批量持久化。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的管道配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 采集传输配置
    #[serde(default)]
    pub ingest: IngestConfig,

    /// 分流队列配置
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// 广播服务配置
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// 持久化配置
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// 采集传输类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// TCP 监听，只接受一个客户端
    #[default]
    Tcp,
    /// 串口
    Serial,
}

/// 采集配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 传输类型
    pub transport: TransportKind,

    /// TCP 监听地址
    pub bind: String,

    /// 串口设备路径 (transport = "serial")
    pub serial_path: Option<String>,

    /// 串口波特率
    pub baud_rate: u32,

    /// 单行最大字节数，超出后丢弃该行
    pub max_line_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            bind: "0.0.0.0:7004".to_string(),
            serial_path: None,
            baud_rate: 115_200,
            max_line_bytes: 64 * 1024,
        }
    }
}

/// 队列溢出策略 (背压满时)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// 丢弃最新的样本
    #[default]
    DropNewest,
    /// 丢弃最旧的样本
    DropOldest,
    /// 阻塞直到有空位
    Block,
    /// 无界队列
    Unbounded,
}

impl OverflowPolicy {
    /// 该策略是否需要容量上限
    pub fn is_bounded(&self) -> bool {
        !matches!(self, Self::Unbounded)
    }
}

/// 单条路径的队列配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    /// 队列容量 (unbounded 时忽略)
    pub capacity: usize,

    /// 溢出策略
    pub overflow: OverflowPolicy,
}

impl PathConfig {
    /// Create a new path configuration
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self { capacity, overflow }
    }

    /// Unbounded path (reference behaviour)
    pub fn unbounded() -> Self {
        Self::new(0, OverflowPolicy::Unbounded)
    }
}

/// 分流配置：广播路径与持久化路径各自独立
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// 广播路径 (允许丢弃)
    pub broadcast: PathConfig,

    /// 持久化路径 (不允许丢失)
    pub persistence: PathConfig,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            broadcast: PathConfig::new(1024, OverflowPolicy::DropNewest),
            persistence: PathConfig::new(65_536, OverflowPolicy::Block),
        }
    }
}

/// 广播服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// WebSocket 监听地址
    pub bind: String,

    /// 单个订阅者发送超时 (毫秒, 0 = 不限)
    pub send_timeout_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8765".to_string(),
            send_timeout_ms: 5_000,
        }
    }
}

/// 持久化存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// MySQL 数据库
    #[default]
    Mysql,
    /// 仅日志输出 (无数据库调试)
    Log,
}

/// 持久化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// 存储类型
    pub store: StoreKind,

    /// 数据库连接 URL (store = "mysql")
    pub database_url: Option<String>,

    /// 固定表名；为空时按启动时间生成
    pub table: Option<String>,

    /// 自动生成表名的前缀
    pub table_prefix: String,

    /// 启动时创建表 (CREATE TABLE IF NOT EXISTS)
    pub create_table: bool,

    /// 批量大小
    pub batch_size: usize,

    /// 部分批次的最长等待 (毫秒, 0 = 仅满批写入)
    pub flush_interval_ms: u64,

    /// 关闭时写入未满批次
    pub flush_on_shutdown: bool,

    /// 写入失败重试策略
    pub retry: RetryConfig,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Mysql,
            database_url: None,
            table: None,
            table_prefix: "gyro_data_".to_string(),
            create_table: true,
            batch_size: 90,
            flush_interval_ms: 0,
            flush_on_shutdown: true,
            retry: RetryConfig::default(),
        }
    }
}

/// 批量写入失败重试策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 最大尝试次数 (1 = 不重试)
    pub max_attempts: u32,

    /// 初始退避 (毫秒)
    pub initial_backoff_ms: u64,

    /// 最大退避 (毫秒)
    pub max_backoff_ms: u64,

    /// 死信文件 (JSON lines)；为空时失败批次直接丢弃
    pub dead_letter_path: Option<PathBuf>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            dead_letter_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blueprint_defaults() {
        let blueprint = PipelineBlueprint::default();
        assert_eq!(blueprint.ingest.transport, TransportKind::Tcp);
        assert_eq!(blueprint.broadcast.bind, "0.0.0.0:8765");
        assert_eq!(blueprint.persistence.batch_size, 90);
        assert_eq!(blueprint.persistence.retry.max_attempts, 1);
        assert_eq!(
            blueprint.fanout.broadcast.overflow,
            OverflowPolicy::DropNewest
        );
        assert_eq!(blueprint.fanout.persistence.overflow, OverflowPolicy::Block);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let blueprint: PipelineBlueprint = serde_json::from_str("{}").unwrap();
        assert_eq!(blueprint.persistence.table_prefix, "gyro_data_");
        assert!(blueprint.persistence.flush_on_shutdown);
    }

    #[test]
    fn overflow_policy_serde() {
        let policy: OverflowPolicy = serde_json::from_str("\"drop_oldest\"").unwrap();
        assert_eq!(policy, OverflowPolicy::DropOldest);
        assert!(policy.is_bounded());
        assert!(!OverflowPolicy::Unbounded.is_bounded());
    }
}
