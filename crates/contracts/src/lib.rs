//! # Contracts
//!
//! Frozen interface contracts shared by every gyro-relay crate: the sample data
//! model, the pipeline configuration blueprint, the persistence target and the
//! durable-store trait.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - `Sample::timestamp` is producer-assigned milliseconds since the Unix epoch
//! - The pipeline never reorders or validates monotonicity of timestamps

mod blueprint;
mod error;
mod sample;
mod store;
mod target;

pub use blueprint::*;
pub use error::*;
pub use sample::*;
pub use store::*;
pub use target::{
    validate_identifier, validate_table_prefix, PersistenceTarget, TableName, TIMESTAMP_SUFFIX_LEN,
};
