//! BatchWriter - drains the persistence path into fixed-size multi-row inserts

use std::path::PathBuf;
use std::time::{Duration, Instant};

use contracts::{PersistenceConfig, PersistenceTarget, Sample, SampleStore, TableName};
use fanout::PathReceiver;
use observability::{record_batch, record_batch_retry, record_sample_skipped, BatchStatus, RunningStats, StatsSummary};
use tracing::{debug, error, info, instrument, warn};

use crate::buffer::BatchBuffer;
use crate::dead_letter::DeadLetterLog;
use crate::error::{PersistenceError, Result};
use crate::retry::RetryPolicy;

/// Writer configuration
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Rows per flush (B)
    pub batch_size: usize,
    /// Flush a partial batch once its oldest row is this old (None = full batches only)
    pub flush_interval: Option<Duration>,
    /// Write the partial batch when the queue closes
    pub flush_on_shutdown: bool,
    pub retry: RetryPolicy,
    /// Failed batches are appended here instead of being dropped
    pub dead_letter_path: Option<PathBuf>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::from(&PersistenceConfig::default())
    }
}

impl From<&PersistenceConfig> for WriterConfig {
    fn from(config: &PersistenceConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            flush_interval: (config.flush_interval_ms > 0)
                .then(|| Duration::from_millis(config.flush_interval_ms)),
            flush_on_shutdown: config.flush_on_shutdown,
            retry: RetryPolicy::from(&config.retry),
            dead_letter_path: config.retry.dead_letter_path.clone(),
        }
    }
}

/// Writer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Collecting samples into the buffer
    Accumulating,
    /// A batch is being written; no samples are taken meanwhile
    Flushing,
}

/// Why a batch is flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushReason {
    Full,
    Interval,
    Shutdown,
}

/// Totals of a writer run
#[derive(Debug, Clone, Default)]
pub struct WriterReport {
    pub table: Option<TableName>,
    pub samples_received: u64,
    /// Non-finite samples skipped
    pub samples_skipped: u64,
    pub batches_written: u64,
    pub rows_written: u64,
    pub batches_failed: u64,
    pub rows_dropped: u64,
    pub rows_dead_lettered: u64,
    /// Partial batch left unwritten at shutdown (`flush_on_shutdown = false`)
    pub rows_lost_on_shutdown: u64,
    pub retries: u64,
    /// Successful flush latency (ms)
    pub flush_latency_ms: StatsSummary,
}

enum Next {
    Sample(Sample),
    Closed,
    Interval,
}

/// Batch persistence writer
pub struct BatchWriter<S> {
    store: S,
    target: PersistenceTarget,
    config: WriterConfig,
    state: WriterState,
    dead_letter: Option<DeadLetterLog>,
    latency: RunningStats,
    report: WriterReport,
}

impl<S: SampleStore> BatchWriter<S> {
    pub fn new(store: S, target: PersistenceTarget, config: WriterConfig) -> Self {
        Self {
            store,
            target,
            config,
            state: WriterState::Accumulating,
            dead_letter: None,
            latency: RunningStats::default(),
            report: WriterReport::default(),
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Resolve the target table and open the dead-letter file.
    ///
    /// Called by [`run`](Self::run) when not done beforehand; callers that must
    /// fail before exposing anything else call it first.
    ///
    /// # Errors
    /// - `PersistenceError::TargetNotResolved` if the target was never resolved
    /// - `PersistenceError::DeadLetter` if the configured dead-letter file cannot be opened
    pub async fn prepare(&mut self) -> Result<TableName> {
        let table = self
            .target
            .get()
            .map_err(|_| PersistenceError::TargetNotResolved)?
            .clone();

        if self.dead_letter.is_none() {
            if let Some(path) = &self.config.dead_letter_path {
                self.dead_letter = Some(DeadLetterLog::open(path).await?);
            }
        }
        self.report.table = Some(table.clone());
        Ok(table)
    }

    /// Drain `rx` until it closes, then flush and close the store.
    ///
    /// # Errors
    /// Only what [`prepare`](Self::prepare) returns; no sample is consumed in
    /// that case. Store write failures are never returned; they are retried,
    /// dead-lettered or dropped.
    #[instrument(name = "batch_writer_run", skip_all, fields(store = %self.store.name()))]
    pub async fn run(mut self, rx: PathReceiver) -> Result<WriterReport> {
        let table = self.prepare().await?;

        info!(
            table = %table,
            batch_size = self.config.batch_size,
            flush_interval_ms = self.config.flush_interval.map(|d| d.as_millis() as u64),
            max_attempts = self.config.retry.max_attempts,
            "batch writer started"
        );

        let mut buffer = BatchBuffer::new(self.config.batch_size);

        loop {
            match self.next(&rx, &buffer).await {
                Next::Sample(sample) => {
                    self.report.samples_received += 1;
                    if !sample.is_finite() {
                        self.report.samples_skipped += 1;
                        record_sample_skipped("non_finite");
                        warn!(timestamp = sample.timestamp, "skipping sample with non-finite component");
                        continue;
                    }
                    if buffer.push(sample) {
                        self.flush(&table, &mut buffer, FlushReason::Full).await;
                    }
                }
                Next::Interval => {
                    self.flush(&table, &mut buffer, FlushReason::Interval).await;
                }
                Next::Closed => break,
            }
        }

        debug!(pending = buffer.len(), "persistence path closed");
        if !buffer.is_empty() {
            if self.config.flush_on_shutdown {
                self.flush(&table, &mut buffer, FlushReason::Shutdown).await;
            } else {
                let lost = buffer.take().len();
                self.report.rows_lost_on_shutdown += lost as u64;
                record_batch(BatchStatus::LostOnShutdown, lost, None);
                warn!(rows = lost, "partial batch not written at shutdown");
            }
        }

        if let Err(e) = self.store.close().await {
            error!(error = %e, "store close failed");
        }

        self.report.flush_latency_ms = self.latency.summary();
        info!(
            rows_written = self.report.rows_written,
            batches_written = self.report.batches_written,
            batches_failed = self.report.batches_failed,
            "batch writer stopped"
        );
        Ok(self.report)
    }

    /// Wait for the next sample, or the flush interval of the partial batch
    async fn next(&self, rx: &PathReceiver, buffer: &BatchBuffer) -> Next {
        let deadline = match (self.config.flush_interval, buffer.age()) {
            (Some(interval), Some(age)) => Some(interval.saturating_sub(age)),
            _ => None,
        };
        let received = match deadline {
            Some(remaining) => match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(received) => received,
                Err(_) => return Next::Interval,
            },
            None => rx.recv().await,
        };
        match received {
            Some(sample) => Next::Sample(sample),
            None => Next::Closed,
        }
    }

    /// Write the buffered rows as one batch; failures never propagate
    async fn flush(&mut self, table: &TableName, buffer: &mut BatchBuffer, reason: FlushReason) {
        if buffer.is_empty() {
            return;
        }
        self.state = WriterState::Flushing;
        let rows = buffer.take();
        let policy = self.config.retry;
        let mut last_error = String::new();

        for attempt in 1..=policy.max_attempts {
            if attempt > 1 {
                self.report.retries += 1;
                record_batch_retry();
                tokio::time::sleep(policy.backoff(attempt)).await;
            }

            let started = Instant::now();
            match self.store.insert_batch(table, &rows).await {
                Ok(written) => {
                    let latency_ms = started.elapsed().as_secs_f64() * 1e3;
                    self.latency.push(latency_ms);
                    self.report.batches_written += 1;
                    self.report.rows_written += written;
                    record_batch(BatchStatus::Written, rows.len(), Some(latency_ms));
                    info!(
                        table = %table,
                        rows = rows.len(),
                        attempt,
                        reason = ?reason,
                        latency_ms,
                        "batch written"
                    );
                    self.state = WriterState::Accumulating;
                    return;
                }
                Err(e) => {
                    warn!(table = %table, rows = rows.len(), attempt, max_attempts = policy.max_attempts, error = %e, "batch write failed");
                    last_error = e.to_string();
                }
            }
        }

        self.report.batches_failed += 1;
        self.give_up(table, &rows, policy.max_attempts, &last_error).await;
        self.state = WriterState::Accumulating;
    }

    /// Dead-letter the batch if configured, otherwise drop it
    async fn give_up(&mut self, table: &TableName, rows: &[Sample], attempts: u32, last_error: &str) {
        if let Some(log) = self.dead_letter.as_mut() {
            match log.append(table, rows, attempts, last_error).await {
                Ok(()) => {
                    self.report.rows_dead_lettered += rows.len() as u64;
                    record_batch(BatchStatus::DeadLettered, rows.len(), None);
                    error!(table = %table, rows = rows.len(), path = %log.path().display(), "batch dead-lettered");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "dead-letter append failed");
                }
            }
        }
        self.report.rows_dropped += rows.len() as u64;
        record_batch(BatchStatus::Dropped, rows.len(), None);
        error!(table = %table, rows = rows.len(), error = %last_error, "batch dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryStore;
    use fanout::{FanoutRouter, OverflowPolicy, PathConfig};
    use contracts::FanoutConfig;

    fn sample(ts: i64) -> Sample {
        Sample::new(ts, ts as f64 * 0.5, 1.0, -1.0)
    }

    fn target() -> PersistenceTarget {
        PersistenceTarget::resolved(TableName::new("gyro_data_test").unwrap())
    }

    fn config(batch_size: usize) -> WriterConfig {
        WriterConfig {
            batch_size,
            ..Default::default()
        }
    }

    /// Router with an unbounded persistence path already holding `samples`
    async fn filled(samples: impl IntoIterator<Item = Sample>) -> PathReceiver {
        let fanout = FanoutConfig {
            broadcast: PathConfig::new(1, OverflowPolicy::DropNewest),
            persistence: PathConfig::unbounded(),
        };
        let (router, _broadcast_rx, persistence_rx) = FanoutRouter::new(fanout);
        for s in samples {
            router.publish(s).await;
        }
        persistence_rx
    }

    #[tokio::test]
    async fn test_exact_batches_in_order() {
        let store = MemoryStore::new();
        let rx = filled((0..180).map(sample)).await;

        let report = BatchWriter::new(store.clone(), target(), config(90))
            .run(rx)
            .await
            .unwrap();

        let batches = store.batches();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|(_, rows)| rows.len() == 90));
        let timestamps: Vec<i64> = store.rows().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, (0..180).collect::<Vec<_>>());
        assert_eq!(report.rows_written, 180);
        assert_eq!(report.flush_latency_ms.count, 2);
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_unresolved_target_is_fatal() {
        let store = MemoryStore::new();
        let rx = filled((0..5).map(sample)).await;

        let err = BatchWriter::new(store.clone(), PersistenceTarget::new(), config(90))
            .run(rx)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::TargetNotResolved));
        assert_eq!(store.attempts(), 0);
    }

    #[tokio::test]
    async fn test_partial_batch_flushed_on_shutdown() {
        let store = MemoryStore::new();
        let rx = filled((0..95).map(sample)).await;

        let report = BatchWriter::new(store.clone(), target(), config(90))
            .run(rx)
            .await
            .unwrap();
        let sizes: Vec<usize> = store.batches().iter().map(|(_, r)| r.len()).collect();
        assert_eq!(sizes, vec![90, 5]);
        assert_eq!(report.rows_lost_on_shutdown, 0);
    }

    #[tokio::test]
    async fn test_partial_batch_lost_without_shutdown_flush() {
        let store = MemoryStore::new();
        let rx = filled((0..95).map(sample)).await;
        let config = WriterConfig {
            flush_on_shutdown: false,
            ..config(90)
        };

        let report = BatchWriter::new(store.clone(), target(), config).run(rx).await.unwrap();
        assert_eq!(store.batches().len(), 1);
        assert_eq!(report.rows_lost_on_shutdown, 5);
    }

    #[tokio::test]
    async fn test_failed_batch_dropped_and_loop_continues() {
        let store = MemoryStore::new();
        store.fail_next(1);
        let rx = filled((0..20).map(sample)).await;

        let report = BatchWriter::new(store.clone(), target(), config(10))
            .run(rx)
            .await
            .unwrap();
        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.rows_dropped, 10);
        assert_eq!(report.rows_written, 10);
        assert_eq!(store.rows()[0].timestamp, 10);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let store = MemoryStore::new();
        store.fail_next(2);
        let rx = filled((0..10).map(sample)).await;
        let config = WriterConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            },
            ..config(10)
        };

        let report = BatchWriter::new(store.clone(), target(), config).run(rx).await.unwrap();
        assert_eq!(store.attempts(), 3);
        assert_eq!(report.retries, 2);
        assert_eq!(report.rows_written, 10);
        assert_eq!(report.batches_failed, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_dead_lettered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead.jsonl");
        let store = MemoryStore::new();
        store.set_fail_always(true);
        let rx = filled((0..10).map(sample)).await;
        let config = WriterConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(1),
            },
            dead_letter_path: Some(path.clone()),
            ..config(10)
        };

        let report = BatchWriter::new(store.clone(), target(), config).run(rx).await.unwrap();
        assert_eq!(report.rows_dead_lettered, 10);
        assert_eq!(report.rows_dropped, 0);

        let entries = DeadLetterLog::read_all(&path).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attempts, 2);
        assert_eq!(entries[0].rows.len(), 10);
    }

    #[tokio::test]
    async fn test_prepare_fails_on_unopenable_dead_letter() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let config = WriterConfig {
            dead_letter_path: Some(blocker.join("dead.jsonl")),
            ..config(10)
        };

        let mut writer = BatchWriter::new(MemoryStore::new(), target(), config);
        let err = writer.prepare().await.unwrap_err();
        assert!(matches!(err, PersistenceError::DeadLetter { .. }));
    }

    #[tokio::test]
    async fn test_prepare_then_run_keeps_dead_letter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead.jsonl");
        let store = MemoryStore::new();
        store.set_fail_always(true);
        let config = WriterConfig {
            dead_letter_path: Some(path.clone()),
            ..config(5)
        };

        let mut writer = BatchWriter::new(store, target(), config);
        assert_eq!(writer.prepare().await.unwrap().as_str(), "gyro_data_test");
        let report = writer.run(filled((0..5).map(sample)).await).await.unwrap();
        assert_eq!(report.rows_dead_lettered, 5);
        assert_eq!(DeadLetterLog::read_all(&path).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_non_finite_samples_skipped() {
        let store = MemoryStore::new();
        let samples = vec![
            sample(1),
            Sample::new(2, f64::NAN, 0.0, 0.0),
            sample(3),
            Sample::new(4, 0.0, f64::INFINITY, 0.0),
        ];
        let rx = filled(samples).await;

        let report = BatchWriter::new(store.clone(), target(), config(2))
            .run(rx)
            .await
            .unwrap();
        assert_eq!(report.samples_skipped, 2);
        let timestamps: Vec<i64> = store.rows().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_interval_flushes_partial_batch() {
        let store = MemoryStore::new();
        let (router, _broadcast_rx, persistence_rx) = FanoutRouter::new(FanoutConfig::default());
        let config = WriterConfig {
            flush_interval: Some(Duration::from_millis(50)),
            ..config(90)
        };
        let writer = tokio::spawn(BatchWriter::new(store.clone(), target(), config).run(persistence_rx));

        for i in 0..3 {
            router.publish(sample(i)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.batches().len(), 1);
        assert_eq!(store.rows().len(), 3);

        drop(router);
        let report = writer.await.unwrap().unwrap();
        assert_eq!(report.batches_written, 1);
    }
}
