//! SampleStore trait - Persistence output interface
//!
//! Defines the abstract interface for durable stores.

use crate::{ContractError, Sample, TableName};

/// Durable batch store trait
///
/// All store implementations must implement this trait.
#[trait_variant::make(SampleStore: Send)]
pub trait LocalSampleStore {
    /// Store name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write all rows as one multi-row insert
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn insert_batch(
        &mut self,
        table: &TableName,
        rows: &[Sample],
    ) -> Result<u64, ContractError>;

    /// Close store connection
    async fn close(&mut self) -> Result<(), ContractError>;
}
