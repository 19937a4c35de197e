//! DeadLetterLog - append-only JSON lines of batches that could not be written

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use contracts::{Sample, TableName};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::{PersistenceError, Result};

/// One failed batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadLetterEntry {
    pub table: String,
    pub failed_at: String,
    pub attempts: u32,
    pub error: String,
    pub rows: Vec<Sample>,
}

/// Append-only dead-letter file
#[derive(Debug)]
pub struct DeadLetterLog {
    path: PathBuf,
    file: File,
}

impl DeadLetterLog {
    /// Open (or create) the file in append mode
    #[instrument(name = "dead_letter_open", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::dead_letter(&path, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| PersistenceError::dead_letter(&path, e))?;
        debug!("dead-letter log opened");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one batch as a single line and flush it
    pub async fn append(
        &mut self,
        table: &TableName,
        rows: &[Sample],
        attempts: u32,
        error: &str,
    ) -> Result<()> {
        let entry = DeadLetterEntry {
            table: table.to_string(),
            failed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            attempts,
            error: error.to_string(),
            rows: rows.to_vec(),
        };
        let mut line = serde_json::to_vec(&entry).map_err(|e| {
            PersistenceError::dead_letter(&self.path, std::io::Error::other(e))
        })?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .await
            .map_err(|e| PersistenceError::dead_letter(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| PersistenceError::dead_letter(&self.path, e))?;
        Ok(())
    }

    /// Read every entry back (used for inspection and replay tooling)
    pub async fn read_all(path: impl AsRef<Path>) -> Result<Vec<DeadLetterEntry>> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PersistenceError::dead_letter(path, e))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| PersistenceError::dead_letter(path, std::io::Error::other(e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dead.jsonl");
        let table = TableName::new("gyro_data_test").unwrap();

        let mut log = DeadLetterLog::open(&path).await.unwrap();
        log.append(&table, &[Sample::new(1, 0.5, 1.5, 2.5)], 3, "connection reset")
            .await
            .unwrap();
        log.append(&table, &[Sample::new(2, 0.0, 0.0, 0.0)], 1, "timeout")
            .await
            .unwrap();

        let entries = DeadLetterLog::read_all(&path).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].table, "gyro_data_test");
        assert_eq!(entries[0].attempts, 3);
        assert_eq!(entries[0].rows, vec![Sample::new(1, 0.5, 1.5, 2.5)]);
        assert_eq!(entries[1].error, "timeout");
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead.jsonl");
        let table = TableName::new("t").unwrap();

        for ts in 0..2 {
            let mut log = DeadLetterLog::open(&path).await.unwrap();
            log.append(&table, &[Sample::new(ts, 0.0, 0.0, 0.0)], 1, "e")
                .await
                .unwrap();
        }
        assert_eq!(DeadLetterLog::read_all(&path).await.unwrap().len(), 2);
    }
}
