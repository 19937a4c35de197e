//! 配置校验模块
//!
//! 校验规则：
//! - 监听地址为 SocketAddr 或 host:port (主机名在绑定时解析)
//! - serial 传输必须指定设备路径
//! - 有界队列容量 > 0
//! - batch_size > 0
//! - mysql 存储必须提供 database_url
//! - 表名 / 表名前缀为合法标识符，前缀需为时间戳后缀留出长度
//! - 重试参数合法

use std::net::SocketAddr;

use contracts::{
    validate_identifier, validate_table_prefix, ContractError, PathConfig, PipelineBlueprint,
    StoreKind, TransportKind,
};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_ingest(blueprint)?;
    validate_fanout(blueprint)?;
    validate_broadcast(blueprint)?;
    validate_persistence(blueprint)?;
    validate_retry(blueprint)?;
    Ok(())
}

fn validate_socket_addr(field: &str, value: &str) -> Result<(), ContractError> {
    if value.parse::<SocketAddr>().is_ok() {
        return Ok(());
    }
    let host_port = value.rsplit_once(':').is_some_and(|(host, port)| {
        !host.is_empty()
            && port.parse::<u16>().is_ok()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    });
    if host_port {
        return Ok(());
    }
    Err(ContractError::config_validation(
        field,
        format!("invalid bind address '{value}', expected ip:port or host:port"),
    ))
}

/// 校验采集传输
fn validate_ingest(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let ingest = &blueprint.ingest;
    match ingest.transport {
        TransportKind::Tcp => validate_socket_addr("ingest.bind", &ingest.bind)?,
        TransportKind::Serial => {
            if ingest.serial_path.as_deref().is_none_or(str::is_empty) {
                return Err(ContractError::config_validation(
                    "ingest.serial_path",
                    "serial transport requires a device path",
                ));
            }
            if ingest.baud_rate == 0 {
                return Err(ContractError::config_validation(
                    "ingest.baud_rate",
                    "baud_rate must be > 0",
                ));
            }
        }
    }

    if ingest.max_line_bytes == 0 {
        return Err(ContractError::config_validation(
            "ingest.max_line_bytes",
            "max_line_bytes must be > 0",
        ));
    }
    Ok(())
}

fn validate_path(field: &str, path: &PathConfig) -> Result<(), ContractError> {
    if path.overflow.is_bounded() && path.capacity == 0 {
        return Err(ContractError::config_validation(
            format!("{field}.capacity"),
            format!(
                "capacity must be > 0 for overflow policy {:?}",
                path.overflow
            ),
        ));
    }
    Ok(())
}

/// 校验分流队列
fn validate_fanout(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_path("fanout.broadcast", &blueprint.fanout.broadcast)?;
    validate_path("fanout.persistence", &blueprint.fanout.persistence)?;
    Ok(())
}

/// 校验广播服务
fn validate_broadcast(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_socket_addr("broadcast.bind", &blueprint.broadcast.bind)
}

/// 校验持久化配置
fn validate_persistence(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let persistence = &blueprint.persistence;

    if persistence.batch_size == 0 {
        return Err(ContractError::config_validation(
            "persistence.batch_size",
            "batch_size must be > 0",
        ));
    }

    if persistence.store == StoreKind::Mysql
        && persistence.database_url.as_deref().is_none_or(str::is_empty)
    {
        return Err(ContractError::config_validation(
            "persistence.database_url",
            "mysql store requires a database_url",
        ));
    }

    match persistence.table.as_deref() {
        Some(table) => validate_identifier(table).map_err(|e| {
            ContractError::config_validation("persistence.table", e.to_string())
        })?,
        None => validate_table_prefix(&persistence.table_prefix).map_err(|e| {
            ContractError::config_validation("persistence.table_prefix", e.to_string())
        })?,
    }

    Ok(())
}

/// 校验重试策略
fn validate_retry(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let retry = &blueprint.persistence.retry;

    if retry.max_attempts == 0 {
        return Err(ContractError::config_validation(
            "persistence.retry.max_attempts",
            "max_attempts must be >= 1",
        ));
    }

    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ContractError::config_validation(
            "persistence.retry.initial_backoff_ms / persistence.retry.max_backoff_ms",
            format!(
                "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            ),
        ));
    }

    Ok(())
}
