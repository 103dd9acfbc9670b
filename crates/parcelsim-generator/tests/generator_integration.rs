//! End-to-end generation tests against the in-memory store

use chrono::{TimeZone, Utc};
use parcelsim_core::{Document, Layout, Pipeline, PoolConfig, Status, TimeWindow};
use parcelsim_generator::{
    allocate, plan_work, run_generation, AllocationConfig, AppConfig, BatchProducer,
    FixedPartition, GeneratorConfig, PayloadKind, ReportingWindow, Transition,
};
use parcelsim_query::{LatestStrategy, QueryExecutor, QueryRequest};
use parcelsim_store::{
    AggregateOptions, AggregateOutput, IndexSpec, InsertOutcome, MemorySession, MemoryStore,
    Session, Store, StoreError,
};
use std::collections::HashMap;
use tempfile::TempDir;

fn week() -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 3, 7, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

fn small_config(container: &str, layout: Layout) -> GeneratorConfig {
    GeneratorConfig::new(container, layout, week(), 1_000)
        .with_partitions(vec![FixedPartition::new(1_000_011, 500).with_name("OfficeMax")])
        .with_window_days(7)
        .with_pool(PoolConfig::new().with_workers(4).with_batch_size(100))
}

fn count(store: &MemoryStore, container: &str, request: &QueryRequest) -> u64 {
    let mut session = store.open_session().unwrap();
    QueryExecutor::new()
        .execute(&mut session, container, request)
        .unwrap()
        .count
}

#[test]
fn one_week_end_to_end() {
    let plan = allocate(
        1_000,
        7,
        &[FixedPartition::new(1_000_011, 500)],
        &AllocationConfig::default(),
    )
    .unwrap();
    assert_eq!(plan.allocations[0].volume, 112);
    assert_eq!(plan.remaining(), 888);
    assert_eq!(plan.tail_count(), 1);

    let store = MemoryStore::new();
    let append = run_generation(&store, &small_config("summary_1_week", Layout::AppendOnly), false)
        .unwrap();
    assert!(append.is_complete());
    assert_eq!(append.committed_entities, 1_000);
    assert!(append.committed_documents >= 2_000);

    let delivered = |strategy| {
        QueryRequest::builder(Layout::AppendOnly)
            .statuses([Status::Delivered])
            .strategy(strategy)
            .window_days(7)
            .build()
            .unwrap()
    };
    let window_count = count(&store, "summary_1_week", &delivered(LatestStrategy::Window));
    let sort_count = count(&store, "summary_1_week", &delivered(LatestStrategy::SortGroup));
    assert!(window_count <= 1_000);
    assert_eq!(window_count, sort_count);
    // about 95% of parcels are delivered
    assert!(window_count > 850, "delivered {}", window_count);

    let distinct = QueryRequest::builder(Layout::AppendOnly)
        .partitions([1_000_011])
        .build()
        .unwrap();
    assert_eq!(count(&store, "summary_1_week", &distinct), 112);
}

#[test]
fn flat_snapshot_end_to_end_with_item_details() {
    let store = MemoryStore::new();
    let config =
        small_config("summary_flat_1_week", Layout::FlatSnapshot).with_payload(PayloadKind::ItemDetail);
    let report = run_generation(&store, &config, false).unwrap();
    assert_eq!(report.committed_documents, 1_000);

    let mut session = store.open_session().unwrap();
    let all = session
        .aggregate("summary_flat_1_week", &Pipeline::new(), &AggregateOptions::new())
        .unwrap();
    let AggregateOutput::Documents(docs) = all else {
        panic!("expected documents");
    };
    let merchants: Vec<&str> = docs
        .iter()
        .filter_map(|d| match d {
            Document::Snapshot(s) if s.partition_id == 1_000_011 => {
                s.details.as_ref().map(|d| d.merchant_name.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(merchants.len(), 112);
    assert!(merchants.iter().all(|m| *m == "OfficeMax"));

    let delivered = QueryRequest::builder(Layout::FlatSnapshot)
        .statuses([Status::Delivered])
        .build()
        .unwrap();
    let n = count(&store, "summary_flat_1_week", &delivered);
    assert!(n <= 1_000);
    // independent draw with weight 50 of 100
    assert!(n > 400 && n < 600, "delivered {}", n);
}

#[test]
fn append_histories_follow_the_lifecycle() {
    let plan = allocate(2_000, 7, &[], &AllocationConfig::default()).unwrap();
    let producer = BatchProducer::new(Layout::AppendOnly, week());
    let mut rng = rand::thread_rng();

    let mut histories: HashMap<String, Vec<Document>> = HashMap::new();
    for item in plan_work(&plan, 500) {
        for doc in producer.produce(&item, &mut rng).documents {
            histories.entry(doc.entity_id().to_string()).or_default().push(doc);
        }
    }
    assert_eq!(histories.len(), 2_000);

    let mut events = 0usize;
    for history in histories.values() {
        events += history.len();
        assert_eq!(history[0].status(), Status::PickedUp);
        for pair in history.windows(2) {
            assert!(pair[0].time() <= pair[1].time());
            assert!(Transition::is_legal(pair[0].status(), pair[1].status()));
        }
        let delivered = history.iter().filter(|d| d.status() == Status::Delivered).count();
        assert!(delivered <= 1);
        assert!(history.iter().all(|d| week().contains(d.time())));
    }

    // event counts are uniform over 2..=20
    let mean = events as f64 / histories.len() as f64;
    assert!(mean > 10.0 && mean < 12.0, "mean events {}", mean);
}

#[test]
fn standard_windows_conserve_volume() {
    let app = AppConfig::standard();
    for window in ReportingWindow::standard() {
        let plan = allocate(
            window.total_volume,
            window.window_days(),
            &app.generator.partitions,
            &app.generator.allocation,
        )
        .unwrap();
        if plan.deficit == 0 {
            assert_eq!(plan.planned_total(), window.total_volume, "{}", window.label);
        } else {
            assert!(plan.validate().is_err());
        }
    }
}

#[test]
fn snapshot_survives_process_boundary() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parcelsim.snapshot");

    let store = MemoryStore::new();
    run_generation(&store, &small_config("summary_1_week", Layout::AppendOnly), false).unwrap();
    store.save_snapshot(&path).unwrap();

    let request = QueryRequest::builder(Layout::AppendOnly)
        .partitions([1_000_011, 2_000_011])
        .statuses([Status::Delivered, Status::AttemptedDelivery])
        .window_days(7)
        .build()
        .unwrap();
    let before = count(&store, "summary_1_week", &request);

    let restored = MemoryStore::load_snapshot(&path).unwrap();
    assert_eq!(count(&restored, "summary_1_week", &request), before);
}

/// Store whose sessions reject every insert for one partition
#[derive(Clone)]
struct FailingStore {
    inner: MemoryStore,
    failing_partition: u64,
}

struct FailingSession {
    inner: MemorySession,
    failing_partition: u64,
}

impl Store for FailingStore {
    type Session = FailingSession;

    fn open_session(&self) -> parcelsim_store::Result<FailingSession> {
        Ok(FailingSession {
            inner: self.inner.open_session()?,
            failing_partition: self.failing_partition,
        })
    }
}

impl Session for FailingSession {
    fn create_container(&mut self, name: &str, layout: Layout) -> parcelsim_store::Result<()> {
        self.inner.create_container(name, layout)
    }

    fn drop_container(&mut self, name: &str) -> parcelsim_store::Result<bool> {
        self.inner.drop_container(name)
    }

    fn container_layout(&self, name: &str) -> parcelsim_store::Result<Layout> {
        self.inner.container_layout(name)
    }

    fn list_containers(&self) -> parcelsim_store::Result<Vec<String>> {
        self.inner.list_containers()
    }

    fn create_index(&mut self, container: &str, index: IndexSpec) -> parcelsim_store::Result<()> {
        self.inner.create_index(container, index)
    }

    fn list_indexes(&self, container: &str) -> parcelsim_store::Result<Vec<IndexSpec>> {
        self.inner.list_indexes(container)
    }

    fn insert_many(
        &mut self,
        container: &str,
        documents: Vec<Document>,
    ) -> parcelsim_store::Result<InsertOutcome> {
        if documents
            .first()
            .is_some_and(|d| d.partition_id() == self.failing_partition)
        {
            return Err(StoreError::WriteRejected(format!(
                "partition {} is read-only",
                self.failing_partition
            )));
        }
        self.inner.insert_many(container, documents)
    }

    fn count_documents(&self, container: &str) -> parcelsim_store::Result<u64> {
        self.inner.count_documents(container)
    }

    fn aggregate(
        &mut self,
        container: &str,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> parcelsim_store::Result<AggregateOutput> {
        self.inner.aggregate(container, pipeline, options)
    }
}

#[test]
fn failed_chunks_are_isolated() {
    let store = FailingStore {
        inner: MemoryStore::new(),
        failing_partition: 2_000_011,
    };
    let report = run_generation(
        &store,
        &small_config("summary_flat_1_week", Layout::FlatSnapshot),
        false,
    )
    .unwrap();

    // 888 tail entities in chunks of 100
    assert_eq!(report.chunks_total, 11);
    assert_eq!(report.chunks_failed, 9);
    assert!(report.failures.iter().all(|f| f.partition_id == 2_000_011));
    assert_eq!(
        report.failures.iter().map(|f| f.entities).sum::<u64>(),
        888
    );
    assert_eq!(report.committed_entities, 112);
    assert_eq!(report.discrepancy(), 888);
    assert!(report.failures[0].reason.contains("read-only"));

    let session = store.inner.open_session().unwrap();
    assert_eq!(session.count_documents("summary_flat_1_week").unwrap(), 112);
}

#[test]
fn default_config_file_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parcelsim.yml");

    AppConfig::write_default(&path).unwrap();
    let loaded = AppConfig::from_file(&path).unwrap();
    let standard = AppConfig::standard();

    assert_eq!(loaded.windows.len(), 4);
    assert_eq!(loaded.windows[0].label, standard.windows[0].label);
    assert_eq!(loaded.generator.partitions.len(), 10);
    assert_eq!(
        AppConfig::load_or_standard(dir.path().join("missing.yml"))
            .unwrap()
            .windows
            .len(),
        4
    );
}
