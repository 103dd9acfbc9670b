//! Pipeline evaluation
//!
//! Stages run in order over a vector of row references. Ordering ties are
//! always broken by insertion sequence, newest first, so the row stored last
//! wins among rows that compare equal.

use crate::error::{Result, StoreError};
use parcelsim_core::{Document, Field, MatchSpec, SortKey, SortOrder, Stage, Status, Timestamp};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Rows processed between deadline checks
const CHECK_INTERVAL: usize = 4096;

/// A stored document as seen by the evaluator
#[derive(Debug, Clone, Copy)]
pub(crate) struct Row<'a> {
    pub seq: u64,
    pub doc: &'a Document,
    /// Set by a `SetWindowFields` stage
    pub is_latest: bool,
}

impl<'a> Row<'a> {
    pub fn new(seq: u64, doc: &'a Document) -> Self {
        Self {
            seq,
            doc,
            is_latest: false,
        }
    }
}

/// Evaluation result
#[derive(Debug)]
pub(crate) enum Evaluated<'a> {
    Rows(Vec<Row<'a>>),
    Count(u64),
}

/// Execution-time budget for one aggregation
pub(crate) struct Deadline<'c> {
    container: &'c str,
    started: Instant,
    budget: Option<Duration>,
}

impl<'c> Deadline<'c> {
    pub fn new(container: &'c str, budget: Option<Duration>) -> Self {
        Self {
            container,
            started: Instant::now(),
            budget,
        }
    }

    /// Fails once the elapsed time reaches the budget. A zero budget always fails.
    pub fn check(&self) -> Result<()> {
        match self.budget {
            Some(budget) if self.started.elapsed() >= budget => Err(StoreError::TimedOut {
                container: self.container.to_string(),
                budget,
            }),
            _ => Ok(()),
        }
    }
}

/// Comparable view of one field of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum FieldKey<'a> {
    Str(&'a str),
    Id(u64),
    Status(Status),
    Time(Timestamp),
}

fn field_key(doc: &Document, field: Field) -> FieldKey<'_> {
    match field {
        Field::EntityId => FieldKey::Str(doc.entity_id()),
        Field::PartitionId => FieldKey::Id(doc.partition_id()),
        Field::Status => FieldKey::Status(doc.status()),
        Field::Time => FieldKey::Time(doc.time()),
    }
}

fn compare_rows(a: &Row<'_>, b: &Row<'_>, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let cmp = field_key(a.doc, key.field).cmp(&field_key(b.doc, key.field));
        let cmp = match key.order {
            SortOrder::Ascending => cmp,
            SortOrder::Descending => cmp.reverse(),
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    b.seq.cmp(&a.seq)
}

/// Run all stages over `rows`
pub(crate) fn evaluate<'a>(
    mut rows: Vec<Row<'a>>,
    stages: &[Stage],
    deadline: &Deadline<'_>,
) -> Result<Evaluated<'a>> {
    for (i, stage) in stages.iter().enumerate() {
        deadline.check()?;

        rows = match stage {
            Stage::Match(spec) => apply_match(rows, spec, deadline)?,
            Stage::Sort(keys) => {
                rows.sort_by(|a, b| compare_rows(a, b, keys));
                rows
            }
            Stage::GroupFirst { key } => group_first(rows, *key, deadline)?,
            Stage::SetWindowFields {
                partition_by,
                sort_by,
            } => {
                flag_latest(&mut rows, *partition_by, sort_by, deadline)?;
                rows
            }
            Stage::Count => {
                if i + 1 != stages.len() {
                    return Err(StoreError::InvalidPipeline(
                        "count must be the final stage".to_string(),
                    ));
                }
                return Ok(Evaluated::Count(rows.len() as u64));
            }
        };
    }

    Ok(Evaluated::Rows(rows))
}

fn apply_match<'a>(
    rows: Vec<Row<'a>>,
    spec: &MatchSpec,
    deadline: &Deadline<'_>,
) -> Result<Vec<Row<'a>>> {
    if spec.is_empty() {
        return Ok(rows);
    }

    let mut kept = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        if i % CHECK_INTERVAL == 0 {
            deadline.check()?;
        }
        if spec.matches(row.doc, row.is_latest) {
            kept.push(row);
        }
    }
    Ok(kept)
}

/// Keep the first row seen for each distinct `key`
fn group_first<'a>(
    rows: Vec<Row<'a>>,
    key: Field,
    deadline: &Deadline<'_>,
) -> Result<Vec<Row<'a>>> {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for (i, row) in rows.into_iter().enumerate() {
        if i % CHECK_INTERVAL == 0 {
            deadline.check()?;
        }
        if seen.insert(field_key(row.doc, key)) {
            kept.push(row);
        }
    }
    Ok(kept)
}

/// Group row indices by the `partition_by` field, preserving first-seen order
fn build_partitions(rows: &[Row<'_>], partition_by: Field) -> Vec<Vec<usize>> {
    let mut slots: HashMap<FieldKey<'_>, usize> = HashMap::new();
    let mut partitions: Vec<Vec<usize>> = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        let slot = *slots.entry(field_key(row.doc, partition_by)).or_insert_with(|| {
            partitions.push(Vec::new());
            partitions.len() - 1
        });
        partitions[slot].push(i);
    }

    partitions
}

fn sort_partition(rows: &[Row<'_>], indices: &[usize], sort_by: &[SortKey]) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], sort_by));
    sorted
}

/// Row number 1 of every window partition is flagged latest
fn flag_latest(
    rows: &mut [Row<'_>],
    partition_by: Field,
    sort_by: &[SortKey],
    deadline: &Deadline<'_>,
) -> Result<()> {
    let partitions = build_partitions(rows, partition_by);
    let mut processed = 0usize;

    for indices in &partitions {
        if processed / CHECK_INTERVAL != (processed + indices.len()) / CHECK_INTERVAL {
            deadline.check()?;
        }
        processed += indices.len();

        let sorted = sort_partition(rows, indices, sort_by);
        for (rank, idx) in sorted.iter().enumerate() {
            rows[*idx].is_latest = rank == 0;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parcelsim_core::EventRecord;

    fn event(entity: &str, status: Status, hour: u32) -> Document {
        EventRecord {
            entity_id: entity.to_string(),
            partition_id: 1000011,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap(),
            status,
        }
        .into()
    }

    fn rows(docs: &[Document]) -> Vec<Row<'_>> {
        docs.iter()
            .enumerate()
            .map(|(i, d)| Row::new(i as u64, d))
            .collect()
    }

    fn unbounded() -> Deadline<'static> {
        Deadline::new("test", None)
    }

    fn statuses(result: Evaluated<'_>) -> Vec<(String, Status)> {
        match result {
            Evaluated::Rows(rows) => rows
                .iter()
                .map(|r| (r.doc.entity_id().to_string(), r.doc.status()))
                .collect(),
            Evaluated::Count(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_sort_group_first_picks_latest() {
        let docs = vec![
            event("A", Status::PickedUp, 1),
            event("B", Status::PickedUp, 2),
            event("A", Status::InTransit, 5),
            event("B", Status::Delivered, 9),
            event("A", Status::InDepot, 3),
        ];

        let stages = vec![
            Stage::Sort(vec![SortKey::asc(Field::EntityId), SortKey::desc(Field::Time)]),
            Stage::GroupFirst {
                key: Field::EntityId,
            },
        ];

        let result = evaluate(rows(&docs), &stages, &unbounded()).unwrap();
        assert_eq!(
            statuses(result),
            vec![
                ("A".to_string(), Status::InTransit),
                ("B".to_string(), Status::Delivered)
            ]
        );
    }

    #[test]
    fn test_window_flags_one_row_per_entity() {
        let docs = vec![
            event("A", Status::PickedUp, 1),
            event("A", Status::InTransit, 4),
            event("B", Status::PickedUp, 1),
        ];

        let stages = vec![
            Stage::SetWindowFields {
                partition_by: Field::EntityId,
                sort_by: vec![SortKey::desc(Field::Time)],
            },
            Stage::Match(MatchSpec::new().latest_only()),
        ];

        let result = evaluate(rows(&docs), &stages, &unbounded()).unwrap();
        assert_eq!(
            statuses(result),
            vec![
                ("A".to_string(), Status::InTransit),
                ("B".to_string(), Status::PickedUp)
            ]
        );
    }

    #[test]
    fn test_ties_resolve_to_last_stored() {
        let docs = vec![
            event("A", Status::OutForDelivery, 6),
            event("A", Status::AttemptedDelivery, 6),
        ];

        let window = vec![
            Stage::SetWindowFields {
                partition_by: Field::EntityId,
                sort_by: vec![SortKey::desc(Field::Time)],
            },
            Stage::Match(MatchSpec::new().latest_only()),
        ];
        let grouped = vec![
            Stage::Sort(vec![SortKey::asc(Field::EntityId), SortKey::desc(Field::Time)]),
            Stage::GroupFirst {
                key: Field::EntityId,
            },
        ];

        let expected = vec![("A".to_string(), Status::AttemptedDelivery)];
        assert_eq!(
            statuses(evaluate(rows(&docs), &window, &unbounded()).unwrap()),
            expected
        );
        assert_eq!(
            statuses(evaluate(rows(&docs), &grouped, &unbounded()).unwrap()),
            expected
        );
    }

    #[test]
    fn test_count_must_be_last() {
        let docs = vec![event("A", Status::PickedUp, 1)];
        let stages = vec![Stage::Count, Stage::Match(MatchSpec::new())];
        let err = evaluate(rows(&docs), &stages, &unbounded()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPipeline(_)));
    }

    #[test]
    fn test_zero_budget_times_out() {
        let docs = vec![event("A", Status::PickedUp, 1)];
        let deadline = Deadline::new("events", Some(Duration::ZERO));
        let err = evaluate(rows(&docs), &[Stage::Count], &deadline).unwrap_err();
        assert!(err.is_timeout());
    }
}
