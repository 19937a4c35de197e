//! MemoryStore - in-memory store with injectable failures
//!
//! 用于无数据库的测试。克隆共享同一份记录，writer 消费 store 后仍可检查结果。

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, Sample, SampleStore, TableName};
use parking_lot::Mutex;

#[derive(Default)]
struct Shared {
    batches: Mutex<Vec<(TableName, Vec<Sample>)>>,
    attempts: AtomicU64,
    fail_next: AtomicU32,
    fail_always: AtomicBool,
    closed: AtomicBool,
}

/// In-memory sample store
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before every insert
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` insert attempts
    pub fn fail_next(&self, n: u32) {
        self.shared.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every insert until switched off
    pub fn set_fail_always(&self, fail: bool) {
        self.shared.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Successfully written batches, in write order
    pub fn batches(&self) -> Vec<(TableName, Vec<Sample>)> {
        self.shared.batches.lock().clone()
    }

    /// All written rows, in write order
    pub fn rows(&self) -> Vec<Sample> {
        self.shared
            .batches
            .lock()
            .iter()
            .flat_map(|(_, rows)| rows.iter().copied())
            .collect()
    }

    /// Insert attempts (successful or not)
    pub fn attempts(&self) -> u64 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        if self.shared.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl SampleStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert_batch(&mut self, table: &TableName, rows: &[Sample]) -> Result<u64, ContractError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail() {
            return Err(ContractError::store_write("memory", "injected failure"));
        }
        self.shared
            .batches
            .lock()
            .push((table.clone(), rows.to_vec()));
        Ok(rows.len() as u64)
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
