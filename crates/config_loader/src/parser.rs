//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, PipelineBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<PipelineBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<PipelineBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{OverflowPolicy, StoreKind, TransportKind};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[ingest]
transport = "tcp"
bind = "127.0.0.1:7004"

[broadcast]
bind = "127.0.0.1:8765"

[persistence]
store = "log"
batch_size = 10
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.ingest.transport, TransportKind::Tcp);
        assert_eq!(bp.persistence.store, StoreKind::Log);
        assert_eq!(bp.persistence.batch_size, 10);
        // Untouched sections keep their defaults
        assert_eq!(bp.fanout.broadcast.overflow, OverflowPolicy::DropNewest);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "ingest": { "transport": "serial", "serial_path": "/dev/rfcomm0" },
            "fanout": {
                "broadcast": { "capacity": 16, "overflow": "drop_oldest" },
                "persistence": { "capacity": 0, "overflow": "unbounded" }
            },
            "persistence": { "store": "mysql", "database_url": "mysql://u:p@localhost/db" }
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.ingest.serial_path.as_deref(), Some("/dev/rfcomm0"));
        assert_eq!(bp.fanout.persistence.overflow, OverflowPolicy::Unbounded);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_unknown_overflow_policy() {
        let content = r#"
[fanout.broadcast]
capacity = 10
overflow = "drop_everything"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
