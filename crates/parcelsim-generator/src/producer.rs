//! Work enumeration and batch production
//!
//! The allocation plan is cut into (partition, chunk) work items up front on
//! one thread. Each item is then turned into documents independently, so
//! items can be produced on any worker in any order.

use crate::allocation::{Allocation, AllocationPlan};
use crate::lifecycle::{random_instant, Lifecycle};
use crate::payload::{NoPayload, PayloadProvider};
use parcelsim_core::{
    Document, EventRecord, Layout, PartitionId, SnapshotRecord, Status, TimeWindow,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Flat-snapshot status weights, in code order
const SNAPSHOT_WEIGHTS: &[(Status, u32)] = &[
    (Status::PickedUp, 5),
    (Status::InTransit, 15),
    (Status::InDepot, 15),
    (Status::OutForDelivery, 10),
    (Status::Delivered, 50),
    (Status::AttemptedDelivery, 5),
];

/// Entity id rendering: prefix plus zero-padded number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdFormat {
    pub prefix: String,
    pub width: usize,
}

impl Default for IdFormat {
    fn default() -> Self {
        Self {
            prefix: "NZ".to_string(),
            width: 9,
        }
    }
}

impl IdFormat {
    pub fn format(&self, n: u64) -> String {
        format!("{}{:0width$}", self.prefix, n, width = self.width)
    }
}

/// One chunk of one allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub allocation: Arc<Allocation>,
    pub chunk_index: usize,
    /// First entity number in this chunk
    pub id_start: u64,
    pub entities: u64,
}

impl WorkItem {
    pub fn partition_id(&self) -> PartitionId {
        self.allocation.partition_id
    }
}

/// Enumerate every chunk of every allocation. Chunks hold at most
/// `batch_size` entities and never span allocations.
pub fn plan_work(plan: &AllocationPlan, batch_size: usize) -> Vec<WorkItem> {
    let batch_size = batch_size.max(1) as u64;
    let mut items = Vec::new();

    for allocation in &plan.allocations {
        let allocation = Arc::new(allocation.clone());
        let mut offset = 0;
        let mut chunk_index = 0;
        while offset < allocation.volume {
            let entities = batch_size.min(allocation.volume - offset);
            items.push(WorkItem {
                allocation: Arc::clone(&allocation),
                chunk_index,
                id_start: allocation.id_start + offset,
                entities,
            });
            offset += entities;
            chunk_index += 1;
        }
    }

    items
}

/// Documents produced for one work item
#[derive(Debug, Clone)]
pub struct Batch {
    pub partition_id: PartitionId,
    pub chunk_index: usize,
    pub entities: u64,
    pub documents: Vec<Document>,
}

/// Turns work items into documents for one layout
pub struct BatchProducer {
    layout: Layout,
    window: TimeWindow,
    lifecycle: Lifecycle,
    payload: Box<dyn PayloadProvider>,
    ids: IdFormat,
}

impl BatchProducer {
    /// Create a new producer with default lifecycle, no payload and default
    /// id format
    pub fn new(layout: Layout, window: TimeWindow) -> Self {
        Self {
            layout,
            window,
            lifecycle: Lifecycle::default(),
            payload: Box::new(NoPayload),
            ids: IdFormat::default(),
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Payload attached to flat-snapshot records
    pub fn with_payload(mut self, payload: Box<dyn PayloadProvider>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_id_format(mut self, ids: IdFormat) -> Self {
        self.ids = ids;
        self
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Produce one work item's documents
    pub fn produce<R: Rng>(&self, item: &WorkItem, rng: &mut R) -> Batch {
        let mut documents = Vec::with_capacity(match self.layout {
            Layout::FlatSnapshot => item.entities as usize,
            Layout::AppendOnly => item.entities as usize * 8,
        });

        for n in item.id_start..item.id_start + item.entities {
            let entity_id = self.ids.format(n);
            match self.layout {
                Layout::FlatSnapshot => {
                    documents.push(self.snapshot(entity_id, &item.allocation, rng).into())
                }
                Layout::AppendOnly => self.events(entity_id, item.partition_id(), rng, &mut documents),
            }
        }

        Batch {
            partition_id: item.partition_id(),
            chunk_index: item.chunk_index,
            entities: item.entities,
            documents,
        }
    }

    fn snapshot<R: Rng>(&self, entity_id: String, allocation: &Allocation, rng: &mut R) -> SnapshotRecord {
        let status = weighted_choice(rng, SNAPSHOT_WEIGHTS);
        let event_time = random_instant(rng, self.window.start, self.window.end);
        let details = self.payload.details(&entity_id, allocation, event_time, rng);
        SnapshotRecord {
            entity_id,
            partition_id: allocation.partition_id,
            status,
            event_time,
            details,
        }
    }

    fn events<R: Rng>(
        &self,
        entity_id: String,
        partition_id: PartitionId,
        rng: &mut R,
        out: &mut Vec<Document>,
    ) {
        for change in self.lifecycle.generate(rng, self.window.start, self.window.end) {
            out.push(
                EventRecord {
                    entity_id: entity_id.clone(),
                    partition_id,
                    timestamp: change.at,
                    status: change.status,
                }
                .into(),
            );
        }
    }
}

/// Selects an item based on weights.
fn weighted_choice<T: Copy>(rng: &mut impl Rng, items: &[(T, u32)]) -> T {
    let total: u32 = items.iter().map(|(_, w)| w).sum();
    let mut choice = rng.gen_range(0..total);

    for (item, weight) in items {
        if choice < *weight {
            return *item;
        }
        choice -= weight;
    }

    items[0].0
}
