//! Sample - Ingestion 输出
//!
//! 陀螺仪采样数据与广播消息结构。

use serde::{Deserialize, Serialize};

/// 陀螺仪采样
///
/// 由 Sample Parser 从一行完整输入解码得到，创建后只读。
/// 类型为 `Copy`，两条下游路径各自持有一份值拷贝。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// 生产端时间戳 (毫秒, Unix epoch)，不保证单调
    pub timestamp: i64,

    /// 角速度 x 分量
    pub x: f64,

    /// 角速度 y 分量
    pub y: f64,

    /// 角速度 z 分量
    pub z: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: i64, x: f64, y: f64, z: f64) -> Self {
        Self { timestamp, x, y, z }
    }

    /// All three vector components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// 推送给订阅者的广播消息
///
/// Wire shape: `{"type":"gyro","x":<f64>,"y":<f64>,"z":<f64>}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastMessage {
    /// 陀螺仪向量
    Gyro { x: f64, y: f64, z: f64 },
}

impl BroadcastMessage {
    /// Serialize to the UTF-8 JSON text frame sent to subscribers
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&Sample> for BroadcastMessage {
    fn from(sample: &Sample) -> Self {
        Self::Gyro {
            x: sample.x,
            y: sample.y,
            z: sample.z,
        }
    }
}
