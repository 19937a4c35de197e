//! SampleReader - 字节流到样本序列
//!
//! 惰性、无界、不可重启。解码失败只记录并计数，不会终止序列；
//! EOF 或读错误结束序列，不重连。

use std::sync::Arc;

use contracts::Sample;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use crate::decode::decode_line;
use crate::framer::{Frame, LineFramer};
use crate::metrics::IngestionMetrics;

const READ_CHUNK: usize = 4096;

/// Reads newline-delimited JSON samples from any async byte source
pub struct SampleReader<R> {
    inner: R,
    source: String,
    framer: LineFramer,
    chunk: Box<[u8]>,
    metrics: Arc<IngestionMetrics>,
    finished: bool,
}

impl<R: AsyncRead + Unpin> SampleReader<R> {
    /// Create a reader over `inner`
    pub fn new(inner: R, max_line_bytes: usize) -> Self {
        Self {
            inner,
            source: "ingest".to_string(),
            framer: LineFramer::new(max_line_bytes),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
            metrics: Arc::new(IngestionMetrics::new()),
            finished: false,
        }
    }

    /// Label used in log records (peer address or device path)
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Share an existing metrics instance
    pub fn with_metrics(mut self, metrics: Arc<IngestionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics of this reader
    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    /// Next decoded sample, or `None` once the transport has ended
    pub async fn next_sample(&mut self) -> Option<Sample> {
        loop {
            while let Some(frame) = self.framer.next_frame() {
                match frame {
                    Frame::Line(line) => {
                        self.metrics.record_line();
                        match decode_line(&line) {
                            Ok(sample) => {
                                self.metrics.record_parsed();
                                trace!(source = %self.source, timestamp = sample.timestamp, "sample decoded");
                                return Some(sample);
                            }
                            Err(e) => {
                                self.metrics.record_discarded();
                                warn!(source = %self.source, error = %e, "discarding malformed line");
                            }
                        }
                    }
                    Frame::Oversize { bytes } => {
                        self.metrics.record_oversize();
                        warn!(source = %self.source, bytes, "discarding oversize line");
                    }
                }
            }

            if self.finished {
                return None;
            }

            match self.inner.read(&mut self.chunk).await {
                Ok(0) => {
                    self.finished = true;
                    let pending = self.framer.pending();
                    if pending > 0 {
                        debug!(source = %self.source, bytes = pending, "discarding unterminated fragment at EOF");
                    }
                    debug!(source = %self.source, "ingestion stream ended");
                    return None;
                }
                Ok(n) => {
                    self.metrics.record_bytes(n);
                    self.framer.push(&self.chunk[..n]);
                }
                Err(e) => {
                    self.finished = true;
                    warn!(source = %self.source, error = %e, "ingestion read failed, ending stream");
                    return None;
                }
            }
        }
    }

    /// Expose the sequence as a `Stream`
    pub fn into_stream(self) -> impl Stream<Item = Sample> {
        futures::stream::unfold(self, |mut reader| async move {
            reader.next_sample().await.map(|sample| (sample, reader))
        })
    }
}
