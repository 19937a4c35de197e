//! MySqlStore - multi-row inserts into a MySQL table

use contracts::{ContractError, Sample, SampleStore, TableName};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, QueryBuilder};
use tracing::{debug, info, instrument};

/// Bind parameters per row
const PARAMS_PER_ROW: usize = 4;

/// MySQL caps prepared statements at 65535 placeholders
const MAX_ROWS_PER_STATEMENT: usize = u16::MAX as usize / PARAMS_PER_ROW;

/// Store writing samples to MySQL
pub struct MySqlStore {
    name: String,
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connect to the database
    ///
    /// # Errors
    /// `ContractError::StoreConnection` if the server is unreachable or rejects the credentials
    #[instrument(name = "mysql_store_connect", skip(url))]
    pub async fn connect(url: &str) -> Result<Self, ContractError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .connect(url)
            .await
            .map_err(|e| ContractError::store_connection("mysql", e.to_string()))?;
        info!("connected to mysql");
        Ok(Self::new(pool))
    }

    pub fn new(pool: MySqlPool) -> Self {
        Self {
            name: "mysql".to_string(),
            pool,
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` with the sample schema
    #[instrument(name = "mysql_store_create_table", skip(self), fields(table = %table))]
    pub async fn create_table(&self, table: &TableName) -> Result<(), ContractError> {
        let sql = create_table_sql(table);
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| ContractError::store_connection(&self.name, e.to_string()))?;
        info!(table = %table, "table ready");
        Ok(())
    }
}

/// DDL for a sample table
pub fn create_table_sql(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS `{table}` (\
         id INT AUTO_INCREMENT PRIMARY KEY, \
         timestamp BIGINT NOT NULL, \
         x FLOAT NOT NULL, \
         y FLOAT NOT NULL, \
         z FLOAT NOT NULL, \
         created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)"
    )
}

/// Multi-row insert for `rows`
fn insert_query<'a>(table: &TableName, rows: &'a [Sample]) -> QueryBuilder<'a, MySql> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO `{table}` (timestamp, x, y, z) "));
    builder.push_values(rows, |mut row, sample| {
        row.push_bind(sample.timestamp)
            .push_bind(sample.x)
            .push_bind(sample.y)
            .push_bind(sample.z);
    });
    builder
}

impl SampleStore for MySqlStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "mysql_store_insert", skip(self, rows), fields(table = %table, rows = rows.len()))]
    async fn insert_batch(&mut self, table: &TableName, rows: &[Sample]) -> Result<u64, ContractError> {
        let mut written = 0;
        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let result = insert_query(table, chunk)
                .build()
                .execute(&self.pool)
                .await
                .map_err(|e| ContractError::store_write(&self.name, e.to_string()))?;
            written += result.rows_affected();
        }
        debug!(written, "batch inserted");
        Ok(written)
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.pool.close().await;
        info!("mysql pool closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql() {
        let table = TableName::new("gyro_data_20250101_000000").unwrap();
        let sql = create_table_sql(&table);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `gyro_data_20250101_000000`"));
        assert!(sql.contains("timestamp BIGINT NOT NULL"));
        assert!(sql.contains("created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_insert_query_placeholders() {
        let table = TableName::new("samples").unwrap();
        let rows = vec![Sample::new(1, 0.1, 0.2, 0.3), Sample::new(2, 0.4, 0.5, 0.6)];
        let builder = insert_query(&table, &rows);
        assert_eq!(
            builder.sql(),
            "INSERT INTO `samples` (timestamp, x, y, z) VALUES (?, ?, ?, ?), (?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_statement_row_limit() {
        assert!(MAX_ROWS_PER_STATEMENT * PARAMS_PER_ROW <= u16::MAX as usize);
    }
}
