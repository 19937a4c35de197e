//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)
//! - Prometheus 指标导出
//! - 批量持久化指标与在线统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::metrics::{record_batch, BatchStatus};
//!
//! // 初始化
//! observability::init_logging(&LoggingConfig::from_verbosity(0, false))?;
//! observability::init_metrics_only(DEFAULT_METRICS_PORT)?;
//!
//! // 记录批次写入
//! record_batch(BatchStatus::Written, rows, Some(latency_ms));
//! ```

pub mod metrics;

use std::str::FromStr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_batch, record_batch_retry, record_sample_skipped, BatchStatus, RunningStats,
    StatsSummary,
};

/// Prometheus 默认端口
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志格式
    pub format: LogFormat,
    /// 默认日志级别 (RUST_LOG 未设置时生效)
    pub default_level: String,
    /// 忽略 RUST_LOG，强制使用默认级别
    pub ignore_env: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            default_level: "info".to_string(),
            ignore_env: false,
        }
    }
}

impl LoggingConfig {
    /// `-q` 只输出 warn 及以上; `-v` debug; `-vv` trace
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self {
                default_level: "warn".to_string(),
                ignore_env: true,
                ..Self::default()
            };
        }
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        Self {
            default_level: level.to_string(),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn filter(&self) -> EnvFilter {
        if self.ignore_env {
            return EnvFilter::new(&self.default_level);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    #[default]
    Pretty,
    /// 紧凑单行格式
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}' (expected json, pretty or compact)")),
        }
    }
}

/// 初始化 Tracing
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(log_format = ?config.format, level = %config.default_level, "logging initialized");
    Ok(())
}

/// 仅初始化 Prometheus 指标（不初始化 Tracing）
///
/// 用于 Tracing 已由其他模块初始化的场景。
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on port {port}"))?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LoggingConfig::from_verbosity(0, false).default_level, "info");
        assert_eq!(LoggingConfig::from_verbosity(1, false).default_level, "debug");
        assert_eq!(LoggingConfig::from_verbosity(3, false).default_level, "trace");

        let quiet = LoggingConfig::from_verbosity(2, true);
        assert_eq!(quiet.default_level, "warn");
        assert!(quiet.ignore_env);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().unwrap_err().contains("xml"));
        assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);
    }

    #[test]
    fn test_quiet_filter_ignores_env() {
        let config = LoggingConfig::from_verbosity(0, true).with_format(LogFormat::Json);
        assert_eq!(config.filter().to_string(), "warn");
    }
}
