//! Error types for CLI operations.

use broadcast::BroadcastError;
use contracts::ContractError;
use fanout::FanoutError;
use ingestion::IngestionError;
use persistence::PersistenceError;
use thiserror::Error;

/// Fatal startup and run failures (exit code 1)
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Table name could not be built or validated
    #[error("Failed to resolve persistence target: {0}")]
    TargetResolution(#[source] ContractError),

    /// Store connection or table preparation failed
    #[error("Persistence store unavailable: {0}")]
    StoreUnavailable(#[source] ContractError),

    /// Writer preconditions failed (dead-letter file, target)
    #[error("Persistence setup failed: {0}")]
    PersistenceSetup(#[source] PersistenceError),

    /// Ingestion transport could not be bound
    #[error("Failed to bind ingestion transport: {0}")]
    IngestBind(#[source] IngestionError),

    /// Broadcast server could not be bound
    #[error("Failed to bind broadcast server: {0}")]
    BroadcastBind(#[source] BroadcastError),

    /// Ingestion transport failed after startup
    #[error("Ingestion failed: {0}")]
    Ingestion(#[source] IngestionError),

    /// The persistence path closed while samples were still arriving
    #[error("Persistence stopped accepting samples: {0}")]
    PersistenceLost(#[source] FanoutError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
