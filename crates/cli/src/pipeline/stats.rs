//! Pipeline statistics and metrics.

use std::time::Duration;

use broadcast::{BroadcastReport, ServerReport};
use fanout::FanoutSnapshot;
use ingestion::IngestionSnapshot;
use persistence::WriterReport;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Parser counters
    pub ingestion: IngestionSnapshot,

    /// Per-path queue counters
    pub fanout: FanoutSnapshot,

    /// Broadcast drain loop totals
    pub broadcast: BroadcastReport,

    /// Subscriber connections handled by the WebSocket server
    pub server: ServerReport,

    /// Subscribers still open at shutdown (closed by the supervisor)
    pub subscribers_closed: usize,

    /// Writer totals; `None` if the writer failed or missed the grace period
    pub persistence: Option<WriterReport>,

    /// Ingestion transport failure, or persistence lost while ingesting
    pub pipeline_error: Option<String>,

    /// Total duration of the pipeline run
    pub duration: Duration,
}

impl PipelineStats {
    /// Parsed samples per second
    pub fn samples_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ingestion.samples_parsed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Rows that will never reach the store
    pub fn rows_lost(&self) -> u64 {
        let writer = self
            .persistence
            .as_ref()
            .map(|r| r.rows_dropped + r.rows_lost_on_shutdown)
            .unwrap_or(0);
        self.fanout.persistence.lost() + writer
    }

    /// Why the run counts as failed, if it does
    pub fn failure(&self) -> Option<String> {
        if let Some(ref e) = self.pipeline_error {
            return Some(e.clone());
        }
        self.persistence
            .is_none()
            .then(|| "batch writer did not report".to_string())
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Samples/s: {:.2}", self.samples_per_sec());
        println!("   └─ Rows lost: {}", self.rows_lost());

        let ing = &self.ingestion;
        println!("\n📥 Ingestion");
        println!("   ├─ Bytes received: {}", ing.bytes_received);
        println!("   ├─ Lines received: {}", ing.lines_received);
        println!("   ├─ Samples parsed: {}", ing.samples_parsed);
        println!("   ├─ Lines discarded: {}", ing.lines_discarded);
        println!("   └─ Oversize lines: {}", ing.oversize_discarded);
        if let Some(ref e) = self.pipeline_error {
            println!("   ⚠️  Ended with error: {}", e);
        }

        println!("\n🔀 Fan-out");
        for (name, path) in [
            ("broadcast", &self.fanout.broadcast),
            ("persistence", &self.fanout.persistence),
        ] {
            println!(
                "   ├─ {}: enqueued {}, dropped {}, evicted {}, closed {}",
                name, path.enqueued, path.dropped, path.evicted, path.closed
            );
        }

        let bc = &self.broadcast;
        println!("\n📡 Broadcast");
        println!("   ├─ Connections: {} ({} failed handshakes)", self.server.accepted, self.server.handshake_failures);
        println!("   ├─ Samples: {} ({} without subscribers)", bc.samples, bc.discarded);
        println!("   ├─ Sends ok: {}", bc.sends_ok);
        println!("   ├─ Sends failed: {}", bc.sends_failed);
        println!("   └─ Closed at shutdown: {}", self.subscribers_closed);

        println!("\n💾 Persistence");
        match &self.persistence {
            Some(report) => {
                if let Some(ref table) = report.table {
                    println!("   ├─ Table: {}", table);
                }
                println!("   ├─ Rows written: {} in {} batches", report.rows_written, report.batches_written);
                println!("   ├─ Failed batches: {} (retries {})", report.batches_failed, report.retries);
                println!("   ├─ Rows dropped: {}", report.rows_dropped);
                println!("   ├─ Rows dead-lettered: {}", report.rows_dead_lettered);
                println!("   ├─ Rows lost on shutdown: {}", report.rows_lost_on_shutdown);
                println!("   ├─ Samples skipped: {}", report.samples_skipped);
                println!("   └─ Flush latency: {}", report.flush_latency_ms);
            }
            None => println!("   └─ Writer did not report"),
        }

        println!();
    }
}
