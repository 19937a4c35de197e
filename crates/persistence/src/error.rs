//! Persistence error types

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The writer was started before the target table was resolved (fatal)
    #[error("persistence target not resolved before the writer started")]
    TargetNotResolved,

    /// Store error (connection, schema, write)
    #[error(transparent)]
    Store(#[from] ContractError),

    /// Dead-letter file could not be opened or written
    #[error("dead-letter log {path}: {source}")]
    DeadLetter {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PersistenceError {
    pub fn dead_letter(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DeadLetter {
            path: path.into(),
            source,
        }
    }
}

/// Persistence Result type alias
pub type Result<T> = std::result::Result<T, PersistenceError>;
