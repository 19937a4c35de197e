//! # Ingestion
//!
//! Gyro sample ingestion.
//!
//! Responsibilities:
//! - Bind the ingestion transport (TCP, single client, or serial)
//! - Reassemble newline-delimited frames from a fragmented byte stream
//! - Decode each line into a `Sample`, dropping malformed lines
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::IngestSource;
//!
//! let source = IngestSource::bind(&blueprint.ingest).await?;
//! let mut reader = source.connect(blueprint.ingest.max_line_bytes).await?;
//! while let Some(sample) = reader.next_sample().await {
//!     router.publish(sample).await;
//! }
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::{MockGyroSource, SampleReader};
//!
//! let (rx, _handle) = MockGyroSource::finite(90).start(4096);
//! let reader = SampleReader::new(rx, 64 * 1024);
//! ```

mod decode;
mod error;
mod framer;
mod metrics;
mod mock;
mod reader;
mod transport;

pub use contracts::Sample;
pub use decode::decode_line;
pub use error::{IngestionError, Result};
pub use framer::{Frame, LineFramer};
pub use metrics::{IngestionMetrics, IngestionSnapshot};
pub use mock::{MockGyroConfig, MockGyroSource};
pub use reader::SampleReader;
pub use transport::{open_serial, BoxedRead, IngestSource, TcpIngestListener};
