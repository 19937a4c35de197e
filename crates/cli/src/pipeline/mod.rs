//! Pipeline supervision module.

mod stats;
mod supervisor;

pub use stats::PipelineStats;
pub use supervisor::Supervisor;
