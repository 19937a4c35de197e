//! 持久化指标与在线统计
//!
//! 批量写入相关的 Prometheus 指标，以及用于运行摘要的 Welford 统计器。

use metrics::{counter, histogram};

/// 批次写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// 写入成功
    Written,
    /// 重试耗尽后丢弃
    Dropped,
    /// 重试耗尽后写入死信文件
    DeadLettered,
    /// 关闭时未写入
    LostOnShutdown,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Dropped => "dropped",
            Self::DeadLettered => "dead_lettered",
            Self::LostOnShutdown => "lost_on_shutdown",
        }
    }
}

/// 记录一次批次结果
///
/// # Example
///
/// ```ignore
/// use observability::metrics::{record_batch, BatchStatus};
///
/// let started = Instant::now();
/// let rows = store.insert_batch(&table, &batch).await?;
/// record_batch(BatchStatus::Written, rows as usize, Some(started.elapsed().as_secs_f64() * 1e3));
/// ```
pub fn record_batch(status: BatchStatus, rows: usize, latency_ms: Option<f64>) {
    counter!("gyro_relay_batches_total", "status" => status.as_str()).increment(1);
    if status == BatchStatus::Written {
        counter!("gyro_relay_rows_written_total").increment(rows as u64);
    } else {
        counter!("gyro_relay_rows_lost_total", "status" => status.as_str()).increment(rows as u64);
    }
    if let Some(latency_ms) = latency_ms {
        histogram!("gyro_relay_flush_latency_ms").record(latency_ms);
    }
}

/// 记录一次写入重试
pub fn record_batch_retry() {
    counter!("gyro_relay_batch_retries_total").increment(1);
}

/// 记录被跳过的样本 (如非有限数值)
pub fn record_sample_skipped(reason: &'static str) {
    counter!("gyro_relay_samples_skipped_total", "reason" => reason).increment(1);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }

    /// 摘要
    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for latency in [12.0, 15.0, 9.0, 20.0, 14.0] {
            stats.push(latency);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 14.0).abs() < 1e-10);
        assert!((stats.min() - 9.0).abs() < 1e-10);
        assert!((stats.max() - 20.0).abs() < 1e-10);
        assert!((stats.variance() - 16.5).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        assert_eq!(StatsSummary::default().to_string(), "N/A");

        let mut stats = RunningStats::default();
        stats.push(2.0);
        stats.push(4.0);
        let text = stats.summary().to_string();
        assert!(text.contains("mean=3.000"), "got: {text}");
        assert!(text.contains("(n=2)"), "got: {text}");
    }

    #[test]
    fn test_record_functions_without_recorder() {
        // No recorder installed: calls are no-ops.
        record_batch(BatchStatus::Written, 90, Some(3.5));
        record_batch(BatchStatus::Dropped, 90, None);
        record_batch_retry();
        record_sample_skipped("non_finite");
        assert_eq!(BatchStatus::DeadLettered.as_str(), "dead_lettered");
    }
}
