//! Pipeline supervisor - startup wiring and ordered shutdown.
//!
//! ```text
//! ingestion task ──► FanoutRouter ─┬─► broadcast path ──► BroadcastService ──► subscribers
//!                                  └─► persistence path ─► BatchWriter ──────► store
//! ```
//!
//! The ingestion task owns the only router handle, so ending it closes both
//! paths and lets every consumer drain.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use broadcast::{BroadcastReport, BroadcastService, ServerReport, SubscriberRegistry, WsServer};
use chrono::Local;
use contracts::{PersistenceTarget, PipelineBlueprint, SampleStore, TableName};
use fanout::{FanoutMetrics, FanoutRouter};
use ingestion::{IngestSource, IngestionMetrics};
use persistence::{BatchWriter, ConfiguredStore, WriterConfig, WriterReport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::PipelineStats;
use crate::error::{CliError, Result};

/// Time the writer gets to drain, flush and close after ingestion stops
pub const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Starts the pipeline and hands back a [`RunningPipeline`]
pub struct Supervisor;

impl Supervisor {
    /// Start with the store selected by `blueprint.persistence`.
    ///
    /// # Errors
    /// Target resolution, store connection / table creation, dead-letter file,
    /// or a bind failure.
    /// Nothing is listening on the broadcast port when this fails.
    pub async fn start(blueprint: PipelineBlueprint) -> Result<RunningPipeline> {
        let target = resolve_target(&blueprint)?;
        let table = target.get().map_err(CliError::TargetResolution)?.clone();

        let store = ConfiguredStore::connect(&blueprint.persistence)
            .await
            .map_err(CliError::StoreUnavailable)?;
        store
            .prepare(&table, blueprint.persistence.create_table)
            .await
            .map_err(CliError::StoreUnavailable)?;

        Self::launch(blueprint, store, target).await
    }

    /// Start with a caller-provided store (table creation is the caller's concern)
    pub async fn start_with_store<S>(blueprint: PipelineBlueprint, store: S) -> Result<RunningPipeline>
    where
        S: SampleStore + Sync + 'static,
    {
        let target = resolve_target(&blueprint)?;
        Self::launch(blueprint, store, target).await
    }

    /// Run until `shutdown_signal` fires or the ingestion client goes away
    pub async fn run_until<F>(blueprint: PipelineBlueprint, shutdown_signal: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let mut running = Self::start(blueprint).await?;
        info!(
            table = %running.table(),
            ingest = ?running.ingest_addr(),
            broadcast = %running.broadcast_addr(),
            "Relay ready, waiting for the gyro producer"
        );

        tokio::select! {
            _ = shutdown_signal => {
                warn!("Received shutdown signal, stopping pipeline...");
            }
            _ = running.wait_for_ingest_end() => {
                info!("Ingestion ended, stopping pipeline...");
            }
        }
        debug!(subscribers = running.registry().len(), "stopping with open subscribers");

        Ok(running.shutdown().await)
    }

    #[instrument(name = "pipeline_start", skip_all)]
    async fn launch<S>(
        blueprint: PipelineBlueprint,
        store: S,
        target: PersistenceTarget,
    ) -> Result<RunningPipeline>
    where
        S: SampleStore + Sync + 'static,
    {
        let started = Instant::now();

        let mut writer = BatchWriter::new(store, target, WriterConfig::from(&blueprint.persistence));
        let table = writer.prepare().await.map_err(CliError::PersistenceSetup)?;

        let source = IngestSource::bind(&blueprint.ingest)
            .await
            .map_err(CliError::IngestBind)?;
        let ingest_addr = source.local_addr();

        let (router, broadcast_rx, persistence_rx) = FanoutRouter::new(blueprint.fanout);
        let fanout_metrics = router.metrics();

        // Last fatal step; the broadcast port is only exposed once everything else is up.
        let server = WsServer::bind(&blueprint.broadcast.bind)
            .await
            .map_err(CliError::BroadcastBind)?;
        let broadcast_addr = server.local_addr();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = SubscriberRegistry::new();

        let writer = tokio::spawn(writer.run(persistence_rx));

        let service = BroadcastService::from_config(registry.clone(), &blueprint.broadcast);
        let drain = tokio::spawn(service.run(broadcast_rx, shutdown_rx.clone()));
        let server = tokio::spawn(server.serve(registry.clone(), shutdown_rx));

        let ingestion_metrics = Arc::new(IngestionMetrics::new());
        let (ingest_done_tx, ingest_done) = watch::channel(false);
        let ingestion = tokio::spawn(ingest(
            source,
            blueprint.ingest.max_line_bytes,
            ingestion_metrics.clone(),
            router,
            ingest_done_tx,
        ));

        info!(
            table = %table,
            ingest = ?ingest_addr,
            broadcast = %broadcast_addr,
            batch_size = blueprint.persistence.batch_size,
            "Pipeline started"
        );

        Ok(RunningPipeline {
            table,
            ingest_addr,
            broadcast_addr,
            registry,
            shutdown_tx,
            ingest_done,
            ingestion,
            server,
            drain,
            writer,
            ingestion_metrics,
            fanout_metrics,
            started,
        })
    }
}

/// Explicit table name, or `<prefix>YYYYmmdd_HHMMSS` in local time
fn resolve_target(blueprint: &PipelineBlueprint) -> Result<PersistenceTarget> {
    let persistence = &blueprint.persistence;
    let table = match persistence.table.as_deref() {
        Some(name) => TableName::new(name),
        None => TableName::timestamped(&persistence.table_prefix, &Local::now()),
    }
    .map_err(CliError::TargetResolution)?;

    let target = PersistenceTarget::new();
    target.resolve(table).map_err(CliError::TargetResolution)?;
    debug!(table = ?target.get().ok(), "persistence target resolved");
    Ok(target)
}

/// Ingestion task body: accept the producer, parse, publish.
///
/// Dropping `router` on return closes both fan-out paths. Losing the
/// persistence path ends ingestion with an error, which also ends the run.
#[instrument(name = "ingestion", skip_all)]
async fn ingest(
    source: IngestSource,
    max_line_bytes: usize,
    metrics: Arc<IngestionMetrics>,
    router: FanoutRouter,
    done: watch::Sender<bool>,
) -> Result<()> {
    let result = pump(source, max_line_bytes, metrics, &router).await;
    drop(router);
    done.send_replace(true);
    result
}

async fn pump(
    source: IngestSource,
    max_line_bytes: usize,
    metrics: Arc<IngestionMetrics>,
    router: &FanoutRouter,
) -> Result<()> {
    let mut reader = source
        .connect(max_line_bytes)
        .await
        .map_err(CliError::Ingestion)?
        .with_metrics(metrics);

    while let Some(sample) = reader.next_sample().await {
        if let Err(e) = router.publish_checked(sample).await {
            error!(error = %e, timestamp = sample.timestamp, "Samples can no longer be stored, stopping ingestion");
            return Err(CliError::PersistenceLost(e));
        }
    }

    info!(samples = reader.metrics().snapshot().samples_parsed, "Ingestion stream ended");
    Ok(())
}

/// Handles of a started pipeline
pub struct RunningPipeline {
    table: TableName,
    ingest_addr: Option<SocketAddr>,
    broadcast_addr: SocketAddr,
    registry: SubscriberRegistry,
    shutdown_tx: watch::Sender<bool>,
    ingest_done: watch::Receiver<bool>,
    ingestion: JoinHandle<Result<()>>,
    server: JoinHandle<ServerReport>,
    drain: JoinHandle<BroadcastReport>,
    writer: JoinHandle<persistence::Result<WriterReport>>,
    ingestion_metrics: Arc<IngestionMetrics>,
    fanout_metrics: FanoutMetrics,
    started: Instant,
}

impl RunningPipeline {
    /// Table every batch goes to
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Bound ingestion address (`None` for serial)
    pub fn ingest_addr(&self) -> Option<SocketAddr> {
        self.ingest_addr
    }

    pub fn broadcast_addr(&self) -> SocketAddr {
        self.broadcast_addr
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Resolves once the ingestion task has finished (EOF, error or abort)
    pub async fn wait_for_ingest_end(&mut self) {
        // Err means the task is gone without signalling, which is also an end.
        let _ = self.ingest_done.wait_for(|done| *done).await;
    }

    /// Ordered shutdown:
    /// 1. stop accepting subscribers and cancel the broadcast drain loop
    /// 2. close every remaining subscriber
    /// 3. stop ingestion, which closes both fan-out paths
    /// 4. let the writer drain, flush and close the store within [`WRITER_GRACE`]
    #[instrument(name = "pipeline_shutdown", skip_all)]
    pub async fn shutdown(self) -> PipelineStats {
        let RunningPipeline {
            registry,
            shutdown_tx,
            ingestion,
            server,
            drain,
            mut writer,
            ingestion_metrics,
            fanout_metrics,
            started,
            ..
        } = self;

        info!("Shutting down pipeline...");
        shutdown_tx.send_replace(true);

        let server = join_or_default(server, "broadcast server").await;
        let broadcast = join_or_default(drain, "broadcast drain").await;
        let subscribers_closed = registry.close_all().await;

        ingestion.abort();
        let pipeline_error = match ingestion.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                error!(error = %e, "Ingestion failed");
                Some(e.to_string())
            }
            Err(e) if e.is_cancelled() => {
                debug!("ingestion task cancelled");
                None
            }
            Err(e) => {
                error!(error = %e, "Ingestion task panicked");
                Some(e.to_string())
            }
        };

        let persistence = match tokio::time::timeout(WRITER_GRACE, &mut writer).await {
            Ok(Ok(Ok(report))) => Some(report),
            Ok(Ok(Err(e))) => {
                error!(error = %e, "Batch writer failed");
                None
            }
            Ok(Err(e)) => {
                error!(error = %e, "Batch writer task panicked");
                None
            }
            Err(_) => {
                warn!(
                    grace_secs = WRITER_GRACE.as_secs(),
                    "Batch writer did not finish in time, aborting"
                );
                writer.abort();
                None
            }
        };

        let stats = PipelineStats {
            ingestion: ingestion_metrics.snapshot(),
            fanout: fanout_metrics.snapshot(),
            broadcast,
            server,
            subscribers_closed,
            persistence,
            pipeline_error,
            duration: started.elapsed(),
        };

        info!(
            samples = stats.ingestion.samples_parsed,
            rows_written = stats.persistence.as_ref().map(|r| r.rows_written),
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline shutdown complete"
        );
        stats
    }
}

async fn join_or_default<T: Default>(handle: JoinHandle<T>, name: &str) -> T {
    match handle.await {
        Ok(value) => value,
        Err(e) => {
            error!(task = name, error = %e, "Task failed");
            T::default()
        }
    }
}
