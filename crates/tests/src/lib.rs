//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约与示例配置测试
//! - 模拟 e2e 测试（无需数据库与真实设备）：
//!   MockGyroSource -> SampleReader -> FanoutRouter -> {BroadcastService, BatchWriter}

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    /// The configuration shipped at the repository root stays loadable
    #[test]
    fn test_shipped_config_is_valid() {
        let content = include_str!("../../../gyro-relay.toml");
        let blueprint = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.persistence.batch_size, 90);
        assert_eq!(blueprint.broadcast.bind, "0.0.0.0:8765");
        assert_eq!(blueprint.persistence.table_prefix, "gyro_data_");
        assert!(blueprint.persistence.table.is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use broadcast::mock::MockSubscriber;
    use broadcast::{BroadcastReport, BroadcastService, SubscriberRegistry};
    use contracts::{FanoutConfig, PersistenceTarget, Sample, TableName};
    use fanout::FanoutRouter;
    use ingestion::{MockGyroConfig, MockGyroSource, SampleReader};
    use persistence::mock::MemoryStore;
    use persistence::{BatchWriter, DeadLetterLog, RetryPolicy, WriterConfig, WriterReport};
    use tokio::sync::watch;
    use tokio::task::JoinHandle;

    const TABLE: &str = "gyro_data_e2e";

    /// Router plus running consumers, wired the way the relay wires them
    struct Harness {
        router: FanoutRouter,
        registry: SubscriberRegistry,
        _shutdown: watch::Sender<bool>,
        broadcast: JoinHandle<BroadcastReport>,
        writer: JoinHandle<persistence::Result<WriterReport>>,
    }

    impl Harness {
        fn start(store: MemoryStore, writer_config: WriterConfig) -> Self {
            let (router, broadcast_rx, persistence_rx) = FanoutRouter::new(FanoutConfig::default());
            let registry = SubscriberRegistry::new();
            let (shutdown, shutdown_rx) = watch::channel(false);

            let service = BroadcastService::new(registry.clone(), Some(Duration::from_secs(1)));
            let broadcast = tokio::spawn(service.run(broadcast_rx, shutdown_rx));

            let target = PersistenceTarget::resolved(TableName::new(TABLE).unwrap());
            let writer = tokio::spawn(BatchWriter::new(store, target, writer_config).run(persistence_rx));

            Self {
                router,
                registry,
                _shutdown: shutdown,
                broadcast,
                writer,
            }
        }

        /// Pump a mock producer through the parser into the router
        async fn ingest(&self, source: &MockGyroSource) -> u64 {
            let (rx, handle) = source.start(4096);
            let mut reader = SampleReader::new(rx, 64 * 1024);
            let mut published = 0;
            while let Some(sample) = reader.next_sample().await {
                self.router.publish(sample).await;
                published += 1;
            }
            assert_eq!(handle.await.unwrap(), published);
            published
        }

        /// Drop the producer handle and wait for both consumers to drain
        async fn finish(self) -> (BroadcastReport, WriterReport) {
            let Harness {
                router,
                broadcast,
                writer,
                _shutdown,
                ..
            } = self;
            drop(router);

            let wait = Duration::from_secs(5);
            let broadcast = tokio::time::timeout(wait, broadcast).await.unwrap().unwrap();
            let writer = tokio::time::timeout(wait, writer).await.unwrap().unwrap().unwrap();
            (broadcast, writer)
        }
    }

    fn writer_config(batch_size: usize) -> WriterConfig {
        WriterConfig {
            batch_size,
            ..Default::default()
        }
    }

    /// 90 samples, no subscriber: one ordered 90-row batch, nothing broadcast
    #[tokio::test]
    async fn test_e2e_batch_without_subscribers() {
        let store = MemoryStore::new();
        let harness = Harness::start(store.clone(), writer_config(90));
        let source = MockGyroSource::finite(90);

        assert_eq!(harness.ingest(&source).await, 90);
        let (broadcast, writer) = harness.finish().await;

        assert_eq!(broadcast.samples, 90);
        assert_eq!(broadcast.discarded, 90);
        assert_eq!(broadcast.sends_ok + broadcast.sends_failed, 0);

        assert_eq!(writer.batches_written, 1);
        assert_eq!(writer.rows_written, 90);
        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0.as_str(), TABLE);
        let timestamps: Vec<i64> = batches[0].1.iter().map(|s| s.timestamp).collect();
        let expected: Vec<i64> = (0..90).map(|i| source.sample_at(i).timestamp).collect();
        assert_eq!(timestamps, expected);
    }

    /// One sample, two subscribers, one failing: both are attempted, the
    /// failing one is gone before the next publish.
    #[tokio::test]
    async fn test_failing_subscriber_isolated() {
        let registry = SubscriberRegistry::new();
        let good = Arc::new(MockSubscriber::new("good"));
        let bad = Arc::new(MockSubscriber::failing("bad"));
        let good_id = registry.register(good.clone());
        let bad_id = registry.register(bad.clone());

        let service = BroadcastService::new(registry.clone(), None);
        let report = service.fan_out(&Sample::new(1, 0.1, 0.2, 0.3)).await;
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert!(registry.contains(good_id));
        assert!(!registry.contains(bad_id));

        let report = service.fan_out(&Sample::new(2, 0.1, 0.2, 0.3)).await;
        assert_eq!(report.attempted, 1);
        assert_eq!(bad.attempts(), 1);
        assert_eq!(good.attempts(), 2);
        assert!(bad.is_closed());
    }

    /// Same isolation through the router and the drain loop; persistence is unaffected
    #[tokio::test]
    async fn test_e2e_failing_subscriber_does_not_affect_persistence() {
        let store = MemoryStore::new();
        let harness = Harness::start(store.clone(), writer_config(90));
        let good = Arc::new(MockSubscriber::new("good"));
        let bad = Arc::new(MockSubscriber::failing("bad"));
        harness.registry.register(good.clone());
        let bad_id = harness.registry.register(bad.clone());

        harness.router.publish(Sample::new(1, 1.0, 2.0, 3.0)).await;
        for _ in 0..200 {
            if !harness.registry.contains(bad_id) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!harness.registry.contains(bad_id));
        harness.router.publish(Sample::new(2, 1.0, 2.0, 3.0)).await;

        let (broadcast, writer) = harness.finish().await;
        assert_eq!(broadcast.sends_ok, 2);
        assert_eq!(broadcast.sends_failed, 1);
        assert_eq!(good.received().len(), 2);
        assert_eq!(bad.attempts(), 1);

        // Partial batch written when the path closes
        assert_eq!(writer.rows_written, 2);
        assert_eq!(store.rows().len(), 2);
    }

    /// A subscriber that starts failing mid-stream is removed on its first failure
    #[tokio::test]
    async fn test_subscriber_failing_midstream_removed() {
        let registry = SubscriberRegistry::new();
        let steady = Arc::new(MockSubscriber::new("steady"));
        let flaky = Arc::new(MockSubscriber::new("flaky"));
        registry.register(steady.clone());
        let flaky_id = registry.register(flaky.clone());
        let service = BroadcastService::new(registry.clone(), None);

        for ts in 0..3 {
            let report = service.fan_out(&Sample::new(ts, 0.0, 0.0, 0.0)).await;
            assert_eq!(report.delivered, 2);
        }

        flaky.set_failing(true);
        let report = service.fan_out(&Sample::new(3, 0.0, 0.0, 0.0)).await;
        assert_eq!(report.failed, 1);
        assert!(!registry.contains(flaky_id));

        service.fan_out(&Sample::new(4, 0.0, 0.0, 0.0)).await;
        assert_eq!(flaky.received().len(), 3);
        assert_eq!(flaky.attempts(), 4);
        assert_eq!(steady.received().len(), 5);
    }

    /// A slow store does not hold back live delivery
    #[tokio::test]
    async fn test_e2e_slow_store_does_not_delay_broadcast() {
        let store = MemoryStore::new().with_delay(Duration::from_millis(300));
        let harness = Harness::start(store.clone(), writer_config(10));
        let subscriber = Arc::new(MockSubscriber::new("viewer"));
        harness.registry.register(subscriber.clone());

        assert_eq!(harness.ingest(&MockGyroSource::finite(30)).await, 30);
        for _ in 0..100 {
            if subscriber.received().len() == 30 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(subscriber.received().len(), 30);
        // The first batch is still sleeping inside the store
        assert!(store.batches().is_empty());

        let (broadcast, writer) = harness.finish().await;
        assert_eq!(broadcast.sends_ok, 30);
        assert_eq!(writer.batches_written, 3);
        assert_eq!(store.rows().len(), 30);
    }

    /// Malformed lines are dropped; the stream and both consumers carry on
    #[tokio::test]
    async fn test_e2e_malformed_lines_skipped() {
        let store = MemoryStore::new();
        let harness = Harness::start(store.clone(), writer_config(10));
        let subscriber = Arc::new(MockSubscriber::new("viewer"));
        harness.registry.register(subscriber.clone());

        let source = MockGyroSource::new(MockGyroConfig {
            count: Some(30),
            malformed_every: Some(3),
            ..Default::default()
        });
        let (rx, handle) = source.start(4096);
        let mut reader = SampleReader::new(rx, 64 * 1024);
        while let Some(sample) = reader.next_sample().await {
            harness.router.publish(sample).await;
        }
        assert_eq!(handle.await.unwrap(), 30);

        let snapshot = reader.metrics().snapshot();
        assert_eq!(snapshot.samples_parsed, 30);
        assert_eq!(snapshot.lines_discarded, 14);

        let (broadcast, writer) = harness.finish().await;
        assert_eq!(broadcast.sends_ok, 30);
        assert_eq!(subscriber.received().len(), 30);
        assert_eq!(writer.batches_written, 3);
        assert_eq!(store.rows().len(), 30);
    }

    /// A store that never accepts a batch: rows end up in the dead-letter
    /// file and live delivery is untouched.
    #[tokio::test]
    async fn test_e2e_dead_letter_on_store_outage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead.jsonl");

        let store = MemoryStore::new();
        store.set_fail_always(true);
        let config = WriterConfig {
            batch_size: 45,
            retry: RetryPolicy {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
            dead_letter_path: Some(path.clone()),
            ..Default::default()
        };
        let harness = Harness::start(store.clone(), config);
        let subscriber = Arc::new(MockSubscriber::new("viewer"));
        harness.registry.register(subscriber.clone());

        harness.ingest(&MockGyroSource::finite(90)).await;
        let (broadcast, writer) = harness.finish().await;

        assert_eq!(broadcast.sends_ok, 90);
        assert_eq!(writer.rows_written, 0);
        assert_eq!(writer.batches_failed, 2);
        assert_eq!(writer.rows_dead_lettered, 90);
        assert_eq!(store.attempts(), 4);

        let entries = DeadLetterLog::read_all(&path).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.table == TABLE && e.rows.len() == 45));
        assert_eq!(entries[0].rows[0].timestamp, MockGyroSource::finite(90).sample_at(0).timestamp);
    }
}
