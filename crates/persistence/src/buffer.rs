//! BatchBuffer - bounded accumulation of samples awaiting one flush

use std::time::{Duration, Instant};

use contracts::Sample;

/// Samples accumulated for the next batch, in arrival order
#[derive(Debug)]
pub struct BatchBuffer {
    rows: Vec<Sample>,
    batch_size: usize,
    oldest_at: Option<Instant>,
}

impl BatchBuffer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            rows: Vec::with_capacity(batch_size),
            batch_size,
            oldest_at: None,
        }
    }

    /// Append a sample. Returns true once the buffer holds a full batch.
    pub fn push(&mut self, sample: Sample) -> bool {
        if self.rows.is_empty() {
            self.oldest_at = Some(Instant::now());
        }
        self.rows.push(sample);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.batch_size
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Time since the oldest buffered sample arrived
    pub fn age(&self) -> Option<Duration> {
        self.oldest_at.map(|t| t.elapsed())
    }

    /// Take the buffered rows, leaving the buffer empty
    pub fn take(&mut self) -> Vec<Sample> {
        self.oldest_at = None;
        std::mem::replace(&mut self.rows, Vec::with_capacity(self.batch_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_at_batch_size() {
        let mut buffer = BatchBuffer::new(3);
        assert!(!buffer.push(Sample::new(1, 0.0, 0.0, 0.0)));
        assert!(!buffer.push(Sample::new(2, 0.0, 0.0, 0.0)));
        assert!(buffer.push(Sample::new(3, 0.0, 0.0, 0.0)));

        let rows = buffer.take();
        assert_eq!(rows.iter().map(|s| s.timestamp).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(buffer.is_empty());
        assert!(buffer.age().is_none());
    }

    #[test]
    fn test_age_tracks_oldest() {
        let mut buffer = BatchBuffer::new(10);
        assert!(buffer.age().is_none());
        buffer.push(Sample::new(1, 0.0, 0.0, 0.0));
        assert!(buffer.age().is_some());
    }
}
