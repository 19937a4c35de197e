//! Store implementations

mod log;
mod mysql;

pub use log::LogStore;
pub use mysql::{create_table_sql, MySqlStore};

use contracts::{
    ContractError, PersistenceConfig, Sample, SampleStore, StoreKind, TableName,
};
use tracing::instrument;

/// Store selected by configuration
pub enum ConfiguredStore {
    Mysql(MySqlStore),
    Log(LogStore),
}

impl ConfiguredStore {
    /// Connect the configured store
    ///
    /// # Errors
    /// Connection failure, or a MySQL store without `database_url`
    #[instrument(name = "store_connect", skip(config), fields(store = ?config.store))]
    pub async fn connect(config: &PersistenceConfig) -> Result<Self, ContractError> {
        match config.store {
            StoreKind::Mysql => {
                let url = config
                    .database_url
                    .as_deref()
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| {
                        ContractError::store_connection("mysql", "database_url is not configured")
                    })?;
                Ok(Self::Mysql(MySqlStore::connect(url).await?))
            }
            StoreKind::Log => Ok(Self::Log(LogStore::new("log"))),
        }
    }

    /// Prepare the target table (MySQL only, when `create_table` is set)
    pub async fn prepare(&self, table: &TableName, create_table: bool) -> Result<(), ContractError> {
        match self {
            Self::Mysql(store) if create_table => store.create_table(table).await,
            _ => Ok(()),
        }
    }
}

impl SampleStore for ConfiguredStore {
    fn name(&self) -> &str {
        match self {
            Self::Mysql(store) => store.name(),
            Self::Log(store) => store.name(),
        }
    }

    async fn insert_batch(&mut self, table: &TableName, rows: &[Sample]) -> Result<u64, ContractError> {
        match self {
            Self::Mysql(store) => store.insert_batch(table, rows).await,
            Self::Log(store) => store.insert_batch(table, rows).await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Mysql(store) => store.close().await,
            Self::Log(store) => store.close().await,
        }
    }
}
