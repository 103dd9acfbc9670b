//! Population allocation across partitions
//!
//! Fixed partitions carry a nominal monthly volume that is scaled to the
//! window length; whatever the total leaves over is spread across synthetic
//! tail partitions. Every allocation owns a contiguous entity-id range.

use crate::error::{GenerateError, Result};
use parcelsim_core::PartitionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Days in the reference month nominal volumes are expressed against
pub const REFERENCE_MONTH_DAYS: u32 = 31;

/// Id ranges are aligned to multiples of this
const STRIDE_UNIT: u64 = 1_000_000;

/// A partition with a nominal monthly volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPartition {
    pub id: PartitionId,
    pub monthly_volume: u64,
    /// Merchant name used by the item-detail payload
    #[serde(default)]
    pub name: Option<String>,
}

impl FixedPartition {
    pub fn new(id: PartitionId, monthly_volume: u64) -> Self {
        Self {
            id,
            monthly_volume,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Tail and id-range settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Volume of every tail partition except the last
    pub tail_chunk_size: u64,
    /// First tail partition id
    pub tail_id_base: PartitionId,
    /// First entity id of the first allocation
    pub id_base: u64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            tail_chunk_size: 50_000,
            tail_id_base: 2_000_011,
            id_base: 100_000_001,
        }
    }
}

/// One partition's share of the population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub partition_id: PartitionId,
    pub volume: u64,
    /// First entity id; the range is `[id_start, id_start + volume)`
    pub id_start: u64,
    pub tail: bool,
    pub name: Option<String>,
}

impl Allocation {
    /// Merchant name, falling back to a synthetic one for unnamed partitions
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Merchant {}", self.partition_id))
    }

    pub fn id_end(&self) -> u64 {
        self.id_start + self.volume
    }
}

/// Full allocation for one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub total_volume: u64,
    pub window_days: u32,
    /// Fixed allocations first, then tail allocations
    pub allocations: Vec<Allocation>,
    /// Distance between consecutive id ranges
    pub stride: u64,
    /// How far fixed volumes overshoot the total
    pub deficit: u64,
}

impl AllocationPlan {
    /// Sum of all allocated volumes
    pub fn planned_total(&self) -> u64 {
        self.allocations.iter().map(|a| a.volume).sum()
    }

    /// Total minus the fixed partitions' scaled volumes. Negative on a
    /// deficit.
    pub fn remaining(&self) -> i64 {
        let fixed: u64 = self
            .allocations
            .iter()
            .filter(|a| !a.tail)
            .map(|a| a.volume)
            .sum();
        self.total_volume as i64 - fixed as i64
    }

    pub fn tail_count(&self) -> usize {
        self.allocations.iter().filter(|a| a.tail).count()
    }

    /// Reject plans that cannot be dispatched as configured
    pub fn validate(&self) -> Result<()> {
        if self.deficit > 0 {
            return Err(GenerateError::VolumeConflict {
                total: self.total_volume,
                planned: self.total_volume + self.deficit,
            });
        }
        Ok(())
    }
}

/// Split `total_volume` across fixed partitions and a synthetic tail
pub fn allocate(
    total_volume: u64,
    window_days: u32,
    fixed: &[FixedPartition],
    config: &AllocationConfig,
) -> Result<AllocationPlan> {
    if window_days == 0 {
        return Err(GenerateError::InvalidWindow(
            "window must cover at least one day".to_string(),
        ));
    }
    if config.tail_chunk_size == 0 {
        return Err(GenerateError::InvalidConfig(
            "tail chunk size must be positive".to_string(),
        ));
    }

    let mut fixed_ids = BTreeSet::new();
    for partition in fixed {
        if !fixed_ids.insert(partition.id) {
            return Err(GenerateError::InvalidConfig(format!(
                "partition {} is listed twice",
                partition.id
            )));
        }
    }

    // floor(monthly / (31 / days)) in exact integer arithmetic
    let mut allocations = fixed
        .iter()
        .map(|p| {
            let scaled = p
                .monthly_volume
                .checked_mul(u64::from(window_days))
                .ok_or_else(|| overflow(format!("volume of partition {}", p.id)))?;
            Ok(Allocation {
                partition_id: p.id,
                volume: scaled / u64::from(REFERENCE_MONTH_DAYS),
                id_start: 0,
                tail: false,
                name: p.name.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let fixed_total = allocations
        .iter()
        .try_fold(0u64, |sum, a| sum.checked_add(a.volume))
        .ok_or_else(|| overflow("sum of fixed volumes".to_string()))?;
    let deficit = fixed_total.saturating_sub(total_volume);
    let mut remaining = total_volume.saturating_sub(fixed_total);

    let mut tail_id = config.tail_id_base;
    while remaining > 0 {
        if fixed_ids.contains(&tail_id) {
            return Err(GenerateError::PartitionIdCollision(tail_id));
        }
        let volume = remaining.min(config.tail_chunk_size);
        allocations.push(Allocation {
            partition_id: tail_id,
            volume,
            id_start: 0,
            tail: true,
            name: None,
        });
        remaining -= volume;
        tail_id = tail_id
            .checked_add(1)
            .ok_or_else(|| overflow("tail partition id".to_string()))?;
    }

    let largest = allocations.iter().map(|a| a.volume).max().unwrap_or(0);
    let stride = largest
        .div_ceil(STRIDE_UNIT)
        .max(1)
        .checked_mul(STRIDE_UNIT)
        .ok_or_else(|| overflow("id stride".to_string()))?;
    for (index, allocation) in allocations.iter_mut().enumerate() {
        allocation.id_start = (index as u64)
            .checked_mul(stride)
            .and_then(|offset| offset.checked_add(config.id_base))
            .filter(|start| start.checked_add(stride).is_some())
            .ok_or_else(|| overflow(format!("id range of partition {}", allocation.partition_id)))?;
    }

    debug!(
        total_volume,
        window_days,
        fixed = fixed.len(),
        tail = allocations.len() - fixed.len(),
        stride,
        deficit,
        "Allocated population"
    );

    Ok(AllocationPlan {
        total_volume,
        window_days,
        allocations,
        stride,
        deficit,
    })
}

fn overflow(what: String) -> GenerateError {
    GenerateError::InvalidConfig(format!("{} overflows u64", what))
}
