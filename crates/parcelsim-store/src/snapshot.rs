//! Snapshot persistence for `MemoryStore`
//!
//! The whole store is written as one bincode file: every container with its
//! layout, index definitions and documents in insertion order.

use crate::error::{Result, StoreError};
use crate::index::IndexSpec;
use crate::memory::{Container, MemoryStore};
use parcelsim_core::{Document, Layout};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    containers: Vec<ContainerSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct ContainerSnapshot {
    name: String,
    layout: Layout,
    indexes: Vec<IndexSpec>,
    documents: Vec<Document>,
}

impl MemoryStore {
    /// Serialize the store to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.snapshot())?)
    }

    /// Deserialize a store from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let file: SnapshotFile = bincode::deserialize(data)?;
        Self::restore(file)
    }

    /// Write the store to `path`, replacing any existing file
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        let documents: usize = snapshot.containers.iter().map(|c| c.documents.len()).sum();

        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush()?;

        info!(
            path = %path.display(),
            containers = snapshot.containers.len(),
            documents,
            "Saved store snapshot"
        );
        Ok(())
    }

    /// Load a store previously written by `save_snapshot`
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let file: SnapshotFile = bincode::deserialize_from(reader)?;
        let store = Self::restore(file)?;

        info!(
            path = %path.display(),
            containers = store.container_names().len(),
            "Loaded store snapshot"
        );
        Ok(store)
    }

    fn snapshot(&self) -> SnapshotFile {
        let containers = self
            .container_names()
            .into_iter()
            .filter_map(|name| {
                let handle = self.container(&name).ok()?;
                let guard = handle.read();
                Some(ContainerSnapshot {
                    layout: guard.layout,
                    indexes: guard.indexes.clone(),
                    documents: guard.rows.iter().map(|r| r.doc.clone()).collect(),
                    name,
                })
            })
            .collect();

        SnapshotFile {
            version: SNAPSHOT_VERSION,
            containers,
        }
    }

    fn restore(file: SnapshotFile) -> Result<Self> {
        if file.version != SNAPSHOT_VERSION {
            return Err(StoreError::Serialization(format!(
                "unsupported snapshot version {}",
                file.version
            )));
        }

        let store = MemoryStore::new();
        for snapshot in file.containers {
            let mut container = Container::new(snapshot.layout);
            container.indexes = snapshot.indexes;
            for doc in snapshot.documents {
                container.push(doc);
            }
            store
                .inner
                .containers
                .insert(snapshot.name, Arc::new(RwLock::new(container)));
        }
        Ok(store)
    }
}
