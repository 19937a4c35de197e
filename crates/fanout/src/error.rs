//! Fan-out error types

use thiserror::Error;

use crate::PathKind;

/// Fan-out errors
#[derive(Debug, Error)]
pub enum FanoutError {
    /// Every consumer of the path has gone away
    #[error("fan-out path '{path}' is closed")]
    PathClosed { path: PathKind },

    /// Both paths are closed, nothing can receive samples any more
    #[error("all fan-out paths are closed")]
    AllPathsClosed,
}
