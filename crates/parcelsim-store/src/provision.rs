//! Container and index provisioning
//!
//! Run once before a load. Provisioning drops any previous container of the
//! same name, so a second run starts from an empty container.

use crate::error::Result;
use crate::index::IndexSpec;
use crate::store::Session;
use parcelsim_core::{Field, Layout};
use tracing::info;

/// Secondary indexes created for a layout.
///
/// Every index the query planner may hint for a layout is in this set.
pub fn index_set(layout: Layout) -> Vec<IndexSpec> {
    use Field::{EntityId, PartitionId, Status, Time};

    match layout {
        Layout::FlatSnapshot => vec![
            IndexSpec::new([PartitionId]),
            IndexSpec::new([Status]),
            IndexSpec::new([Time]),
            IndexSpec::new([EntityId]),
            IndexSpec::new([PartitionId, Status]),
            IndexSpec::new([PartitionId, Time]),
            IndexSpec::new([Status, Time]),
            IndexSpec::new([PartitionId, Status, Time]),
        ],
        Layout::AppendOnly => vec![
            IndexSpec::new([PartitionId]),
            IndexSpec::new([EntityId]),
            IndexSpec::new([Status]),
            IndexSpec::new([Time]),
            IndexSpec::new([PartitionId, Time]),
            IndexSpec::new([PartitionId, Status]),
            IndexSpec::new([EntityId, Time]),
        ],
    }
}

/// Drop, recreate and index a container
pub fn provision<S: Session + ?Sized>(
    session: &mut S,
    container: &str,
    layout: Layout,
) -> Result<Vec<IndexSpec>> {
    if session.drop_container(container)? {
        info!(container, "Dropped existing container");
    }
    session.create_container(container, layout)?;

    let indexes = index_set(layout);
    for index in &indexes {
        session.create_index(container, index.clone())?;
    }

    info!(
        container,
        layout = %layout,
        indexes = indexes.len(),
        "Provisioned container"
    );
    Ok(indexes)
}
