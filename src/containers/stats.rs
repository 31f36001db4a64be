/*!
 * Container Statistics
 * Point-in-time snapshots, serializable for export
 *
 * Snapshots are assembled from relaxed counters and are not taken under a
 * single lock, so fields may disagree slightly under concurrent mutation.
 */

use serde::{Deserialize, Serialize};

/// Lock-free queue snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub len: usize,
    pub pushes: u64,
    pub pops: u64,
}

/// Sharded map snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStats {
    /// Global counter value
    pub len: usize,
    /// Entry count per shard, in shard order
    pub shard_lens: Vec<usize>,
    /// Bucket array length per shard, in shard order
    pub bucket_counts: Vec<usize>,
}

impl MapStats {
    /// Entries in the fullest shard
    pub fn max_shard_len(&self) -> usize {
        self.shard_lens.iter().copied().max().unwrap_or(0)
    }

    /// Sum of per-shard counts
    pub fn shard_total(&self) -> usize {
        self.shard_lens.iter().sum()
    }
}

/// Segmented vector snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStats {
    /// Completed writes
    pub len: usize,
    /// Reserved slots, including writes still in flight
    pub reserved: usize,
    pub segment_count: usize,
    pub segment_capacity: usize,
    /// Sum of per-segment filled counts
    pub filled: usize,
}

impl VectorStats {
    /// Allocated slots across all segments
    pub fn capacity(&self) -> usize {
        self.segment_count * self.segment_capacity
    }
}
