//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 行解码失败 (非致命，丢弃该行)
    #[error("failed to decode line: {message}")]
    Decode {
        /// 错误消息
        message: String,
        /// 原始行 (截断)
        line: String,
    },

    /// 传输绑定失败 (致命)
    #[error("failed to bind ingestion transport {address}: {source}")]
    Bind {
        /// 监听地址或设备路径
        address: String,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 接受连接失败
    #[error("failed to accept ingestion client on {address}: {source}")]
    Accept {
        /// 监听地址
        address: String,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 串口打开失败
    #[error("failed to open serial port {path}: {message}")]
    SerialOpen {
        /// 设备路径
        path: String,
        /// 错误消息
        message: String,
    },

    /// 当前构建不支持该传输
    #[error("transport '{0}' is not supported by this build")]
    UnsupportedTransport(String),
}

impl IngestionError {
    /// 创建解码错误，原始行截断到 120 字节以内
    pub fn decode(message: impl Into<String>, line: &str) -> Self {
        let mut end = line.len().min(120);
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        Self::Decode {
            message: message.into(),
            line: line[..end].to_string(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
