use chrono::{Duration, TimeZone, Utc};
use parcelsim_core::{Document, EventRecord, Layout, MatchSpec, Pipeline, Stage, Status};
use parcelsim_store::{provision, AggregateOptions, AggregateOutput, MemoryStore, Session, Store};
use std::thread;
use tempfile::TempDir;

fn events_for(partition: u64, entities: usize) -> Vec<Document> {
    let base = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    (0..entities)
        .flat_map(|i| {
            let entity_id = format!("NZ{:09}", partition * 1_000 + i as u64);
            [Status::PickedUp, Status::InTransit, Status::Delivered]
                .into_iter()
                .enumerate()
                .map(move |(step, status)| {
                    Document::from(EventRecord {
                        entity_id: entity_id.clone(),
                        partition_id: partition,
                        timestamp: base + Duration::hours(step as i64),
                        status,
                    })
                })
        })
        .collect()
}

#[test]
fn concurrent_sessions_insert_into_one_container() {
    let store = MemoryStore::new();
    let mut admin = store.open_session().unwrap();
    provision(&mut admin, "events", Layout::AppendOnly).unwrap();

    let handles: Vec<_> = (1..=4u64)
        .map(|partition| {
            let store = store.clone();
            thread::spawn(move || {
                let mut session = store.open_session().unwrap();
                session
                    .insert_many("events", events_for(partition, 50))
                    .unwrap()
            })
        })
        .collect();

    let inserted: u64 = handles
        .into_iter()
        .map(|h| h.join().unwrap().inserted)
        .sum();

    assert_eq!(inserted, 4 * 50 * 3);
    assert_eq!(admin.count_documents("events").unwrap(), 600);
    assert_eq!(store.sessions_opened(), 5);
}

#[test]
fn snapshot_file_round_trip_preserves_counts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.bin");

    let store = MemoryStore::new();
    let mut session = store.open_session().unwrap();
    provision(&mut session, "summary_1_week", Layout::AppendOnly).unwrap();
    session
        .insert_many("summary_1_week", events_for(1000011, 20))
        .unwrap();
    store.save_snapshot(&path).unwrap();

    let delivered = Pipeline::new()
        .stage(Stage::Match(
            MatchSpec::new().with_statuses([Status::Delivered].into_iter().collect()),
        ))
        .stage(Stage::Count);

    let restored = MemoryStore::load_snapshot(&path).unwrap();
    let mut reader = restored.open_session().unwrap();
    assert_eq!(reader.count_documents("summary_1_week").unwrap(), 60);
    assert_eq!(
        reader
            .aggregate("summary_1_week", &delivered, &AggregateOptions::new())
            .unwrap(),
        AggregateOutput::Count(20)
    );
    assert_eq!(
        reader.list_indexes("summary_1_week").unwrap(),
        session.list_indexes("summary_1_week").unwrap()
    );
}

#[test]
fn missing_snapshot_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = MemoryStore::load_snapshot(dir.path().join("absent.bin")).unwrap_err();
    assert!(matches!(err, parcelsim_store::StoreError::Io(_)));
}
