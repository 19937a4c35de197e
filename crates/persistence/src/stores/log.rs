//! LogStore - logs batch summaries via tracing (dry runs without a database)

use contracts::{ContractError, Sample, SampleStore, TableName};
use tracing::{info, instrument};

/// Store that only logs what it would write
pub struct LogStore {
    name: String,
    rows_seen: u64,
}

impl LogStore {
    /// Create a new LogStore with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows_seen: 0,
        }
    }

    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }
}

impl SampleStore for LogStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_store_insert", skip(self, rows), fields(store = %self.name))]
    async fn insert_batch(&mut self, table: &TableName, rows: &[Sample]) -> Result<u64, ContractError> {
        self.rows_seen += rows.len() as u64;
        info!(
            table = %table,
            rows = rows.len(),
            first_timestamp = rows.first().map(|s| s.timestamp),
            last_timestamp = rows.last().map(|s| s.timestamp),
            "batch received"
        );
        Ok(rows.len() as u64)
    }

    #[instrument(name = "log_store_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(store = %self.name, rows = self.rows_seen, "LogStore closed");
        Ok(())
    }
}
