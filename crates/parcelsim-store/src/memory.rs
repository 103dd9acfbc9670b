//! In-memory document store
//!
//! Containers live in a `DashMap`; each container sits behind its own
//! `RwLock` so concurrent sessions writing different containers never
//! contend, and readers of one container run in parallel.

use crate::error::{Result, StoreError};
use crate::eval::{self, Deadline, Evaluated, Row};
use crate::index::{IndexSpec, PartitionPostings};
use crate::store::{AggregateOptions, AggregateOutput, InsertOutcome, Session, Store};
use dashmap::DashMap;
use parcelsim_core::{Document, Field, Layout, Pipeline, Stage};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A stored document with its insertion sequence number
#[derive(Debug, Clone)]
pub(crate) struct StoredRow {
    pub seq: u64,
    pub doc: Document,
}

/// One named container
#[derive(Debug)]
pub(crate) struct Container {
    pub layout: Layout,
    pub indexes: Vec<IndexSpec>,
    pub rows: Vec<StoredRow>,
    next_seq: u64,
    postings: PartitionPostings,
}

impl Container {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            indexes: Vec::new(),
            rows: Vec::new(),
            next_seq: 0,
            postings: PartitionPostings::new(),
        }
    }

    pub fn push(&mut self, doc: Document) {
        let position = self.rows.len();
        self.postings.insert(doc.partition_id(), position);
        self.rows.push(StoredRow {
            seq: self.next_seq,
            doc,
        });
        self.next_seq += 1;
    }

    fn find_index(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|idx| idx.name() == name)
    }

    /// Candidate rows for a pipeline. A partition-leading hint narrows the
    /// scan to the partitions named by a leading match stage.
    fn candidates(&self, hint: Option<&IndexSpec>, pipeline: &Pipeline) -> Vec<Row<'_>> {
        let partitions = match (hint, pipeline.stages().first()) {
            (Some(index), Some(Stage::Match(spec)))
                if index.leading_field() == Some(Field::PartitionId) =>
            {
                spec.partitions.as_ref()
            }
            _ => None,
        };

        match partitions {
            Some(partitions) => self
                .postings
                .lookup(partitions)
                .into_iter()
                .map(|pos| {
                    let row = &self.rows[pos];
                    Row::new(row.seq, &row.doc)
                })
                .collect(),
            None => self
                .rows
                .iter()
                .map(|row| Row::new(row.seq, &row.doc))
                .collect(),
        }
    }
}

type ContainerRef = Arc<RwLock<Container>>;

/// Shared state behind a `MemoryStore`
#[derive(Debug, Default)]
pub(crate) struct StoreInner {
    pub containers: DashMap<String, ContainerRef>,
    sessions_opened: AtomicU64,
}

/// In-memory store. Cloning is cheap and shares the same containers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub(crate) inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions opened so far
    pub fn sessions_opened(&self) -> u64 {
        self.inner.sessions_opened.load(Ordering::Relaxed)
    }

    /// Container names, sorted
    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .containers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn container(&self, name: &str) -> Result<ContainerRef> {
        self.inner
            .containers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::ContainerNotFound(name.to_string()))
    }
}

impl Store for MemoryStore {
    type Session = MemorySession;

    fn open_session(&self) -> Result<MemorySession> {
        self.inner.sessions_opened.fetch_add(1, Ordering::Relaxed);
        Ok(MemorySession {
            store: self.clone(),
        })
    }
}

/// Session over a `MemoryStore`
#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
}

impl Session for MemorySession {
    fn create_container(&mut self, name: &str, layout: Layout) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.store.inner.containers.entry(name.to_string()) {
            Entry::Occupied(_) => Err(StoreError::ContainerExists(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(Container::new(layout))));
                debug!(container = name, layout = %layout, "Created container");
                Ok(())
            }
        }
    }

    fn drop_container(&mut self, name: &str) -> Result<bool> {
        Ok(self.store.inner.containers.remove(name).is_some())
    }

    fn container_layout(&self, name: &str) -> Result<Layout> {
        Ok(self.store.container(name)?.read().layout)
    }

    fn list_containers(&self) -> Result<Vec<String>> {
        Ok(self.store.container_names())
    }

    fn create_index(&mut self, container: &str, index: IndexSpec) -> Result<()> {
        let handle = self.store.container(container)?;
        let mut guard = handle.write();
        if !guard.indexes.contains(&index) {
            debug!(container, index = %index, "Created index");
            guard.indexes.push(index);
        }
        Ok(())
    }

    fn list_indexes(&self, container: &str) -> Result<Vec<IndexSpec>> {
        Ok(self.store.container(container)?.read().indexes.clone())
    }

    fn insert_many(&mut self, container: &str, documents: Vec<Document>) -> Result<InsertOutcome> {
        let handle = self.store.container(container)?;
        let mut guard = handle.write();
        let layout = guard.layout;

        let mut outcome = InsertOutcome::default();
        for doc in documents {
            if doc.layout() == layout {
                guard.push(doc);
                outcome.inserted += 1;
            } else {
                outcome.rejected += 1;
            }
        }

        if outcome.rejected > 0 {
            debug!(
                container,
                rejected = outcome.rejected,
                "Skipped documents that do not match the container layout"
            );
        }

        Ok(outcome)
    }

    fn count_documents(&self, container: &str) -> Result<u64> {
        Ok(self.store.container(container)?.read().rows.len() as u64)
    }

    fn aggregate(
        &mut self,
        container: &str,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> Result<AggregateOutput> {
        let handle = self.store.container(container)?;
        let guard = handle.read();

        let hint = match options.hint.as_deref() {
            Some(name) => Some(guard.find_index(name).ok_or_else(|| {
                StoreError::IndexNotFound {
                    container: container.to_string(),
                    index: name.to_string(),
                }
            })?),
            None => None,
        };

        let deadline = Deadline::new(container, options.max_time);
        deadline.check()?;

        let rows = guard.candidates(hint, pipeline);
        debug!(
            container,
            candidates = rows.len(),
            hint = options.hint.as_deref().unwrap_or("none"),
            "Evaluating pipeline"
        );

        match eval::evaluate(rows, pipeline.stages(), &deadline)? {
            Evaluated::Count(n) => Ok(AggregateOutput::Count(n)),
            Evaluated::Rows(rows) => Ok(AggregateOutput::Documents(
                rows.into_iter().map(|r| r.doc.clone()).collect(),
            )),
        }
    }
}
