//! Layered error definitions
//!
//! Categorized by source: config / target / store

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Persistence Target Errors =====
    /// Table name is not a valid identifier
    #[error("invalid table name '{name}': {message}")]
    InvalidTableName { name: String, message: String },

    /// Target read before it was resolved
    #[error("persistence target not resolved")]
    TargetNotResolved,

    /// Target resolved more than once
    #[error("persistence target already resolved to '{current}'")]
    TargetAlreadyResolved { current: String },

    // ===== Store Errors =====
    /// Store connection error
    #[error("store '{store}' connection error: {message}")]
    StoreConnection { store: String, message: String },

    /// Store write error
    #[error("store '{store}' write error: {message}")]
    StoreWrite { store: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid table name error
    pub fn invalid_table_name(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTableName {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create store connection error
    pub fn store_connection(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreConnection {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create store write error
    pub fn store_write(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreWrite {
            store: store.into(),
            message: message.into(),
        }
    }
}
