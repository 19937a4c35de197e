//! Mock 陀螺仪数据源
//!
//! 生成换行分隔的 JSON 样本，用于无真实设备的测试。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::Sample;
use tokio::io::{AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Mock 数据源配置
#[derive(Debug, Clone)]
pub struct MockGyroConfig {
    /// 发送频率 (Hz, 0 = 不限速)
    pub frequency_hz: f64,

    /// 样本总数 (None = 无限)
    pub count: Option<u64>,

    /// 第一个样本的时间戳 (毫秒)
    pub start_timestamp: i64,

    /// 每 N 行插入一行非法数据 (None = 不插入)
    pub malformed_every: Option<u64>,
}

impl Default for MockGyroConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 0.0,
            count: Some(100),
            start_timestamp: 1_700_000_000_000,
            malformed_every: None,
        }
    }
}

/// Mock 陀螺仪数据源
pub struct MockGyroSource {
    config: MockGyroConfig,
    running: Arc<AtomicBool>,
}

impl MockGyroSource {
    /// 创建新的 Mock 数据源
    pub fn new(config: MockGyroConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 固定数量、不限速
    pub fn finite(count: u64) -> Self {
        Self::new(MockGyroConfig {
            count: Some(count),
            ..Default::default()
        })
    }

    /// The `index`-th generated sample
    pub fn sample_at(&self, index: u64) -> Sample {
        let t = index as f64 * 0.01;
        Sample::new(
            self.config.start_timestamp + index as i64,
            t.sin(),
            t.cos(),
            (index % 7) as f64 * 0.5,
        )
    }

    /// 启动并返回内存管道的读端
    pub fn start(&self, buffer: usize) -> (DuplexStream, JoinHandle<u64>) {
        let (tx, rx) = tokio::io::duplex(buffer);
        (rx, self.spawn_into(tx))
    }

    /// 把样本写入任意 `AsyncWrite`，返回已写入的有效样本数
    ///
    /// Writing stops on `stop()`, once `count` is reached, or when the peer
    /// goes away. The writer is shut down afterwards so readers see EOF.
    pub fn spawn_into<W>(&self, mut writer: W) -> JoinHandle<u64>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let source = Self {
            config: self.config.clone(),
            running: self.running.clone(),
        };
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let config = &source.config;
            let interval = (config.frequency_hz > 0.0)
                .then(|| Duration::from_secs_f64(1.0 / config.frequency_hz));
            let mut written = 0u64;
            let mut line_no = 0u64;

            debug!(frequency_hz = config.frequency_hz, count = ?config.count, "mock gyro source started");

            while source.running.load(Ordering::Relaxed) {
                if config.count.is_some_and(|count| written >= count) {
                    break;
                }

                line_no += 1;
                let line = if config.malformed_every.is_some_and(|n| n > 0 && line_no % n == 0) {
                    "{\"timestamp\":\"bad\"}\n".to_string()
                } else {
                    let sample = source.sample_at(written);
                    written += 1;
                    match serde_json::to_string(&sample) {
                        Ok(json) => json + "\n",
                        Err(_) => continue,
                    }
                };

                if writer.write_all(line.as_bytes()).await.is_err() {
                    debug!("mock gyro sink closed");
                    break;
                }
                trace!(line_no, "mock gyro line written");

                if let Some(interval) = interval {
                    tokio::time::sleep(interval).await;
                }
            }

            let _ = writer.shutdown().await;
            source.running.store(false, Ordering::SeqCst);
            debug!(written, "mock gyro source stopped");
            written
        })
    }

    /// 停止发送
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 是否正在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
