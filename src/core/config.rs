/*!
 * Container Configuration
 *
 * Construction-time parameters for the sharded map and segmented vector.
 * Nothing here can be changed once a container has been built.
 */

use super::errors::{ContainerError, ContainerResult};
use super::shard_manager::{ShardManager, WorkloadProfile};
use serde::{Deserialize, Serialize};

/// Default number of map shards
pub const DEFAULT_SHARD_COUNT: usize = 32;

/// Default bucket array length per shard
pub const DEFAULT_BUCKETS_PER_SHARD: usize = 8;

/// Default load factor before a shard doubles its bucket array
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.75;

/// Smallest accepted load factor; below it a shard would double on nearly every insert
pub const MIN_LOAD_FACTOR: f32 = 0.1;

/// Default slots per vector segment
pub const DEFAULT_SEGMENT_CAPACITY: usize = 1024;

/// Sharded map configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Number of independent lock domains (power of 2)
    pub shard_count: usize,
    /// Initial bucket array length inside each shard (power of 2)
    pub initial_buckets_per_shard: usize,
    /// Entries per bucket allowed before a shard grows
    pub max_load_factor: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            initial_buckets_per_shard: DEFAULT_BUCKETS_PER_SHARD,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
        }
    }
}

impl MapConfig {
    /// Configuration with an explicit shard count
    pub const fn with_shards(shard_count: usize) -> Self {
        Self {
            shard_count,
            initial_buckets_per_shard: DEFAULT_BUCKETS_PER_SHARD,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
        }
    }

    /// Configuration sized to the host CPU count for the given contention
    pub fn for_profile(profile: WorkloadProfile) -> Self {
        Self::with_shards(ShardManager::shards(profile))
    }

    /// Check all parameters
    pub fn validate(&self) -> ContainerResult<()> {
        if self.shard_count == 0 || !self.shard_count.is_power_of_two() {
            return Err(ContainerError::InvalidShardCount(self.shard_count));
        }
        if self.initial_buckets_per_shard == 0
            || !self.initial_buckets_per_shard.is_power_of_two()
        {
            return Err(ContainerError::InvalidBucketCount(
                self.initial_buckets_per_shard,
            ));
        }
        if !self.max_load_factor.is_finite() || self.max_load_factor < MIN_LOAD_FACTOR {
            return Err(ContainerError::InvalidLoadFactor(self.max_load_factor));
        }
        Ok(())
    }
}

/// Segmented vector configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Slots per segment
    pub segment_capacity: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
        }
    }
}

impl VectorConfig {
    pub const fn with_segment_capacity(segment_capacity: usize) -> Self {
        Self { segment_capacity }
    }

    /// Check all parameters
    pub fn validate(&self) -> ContainerResult<()> {
        if self.segment_capacity == 0 {
            return Err(ContainerError::InvalidSegmentCapacity(self.segment_capacity));
        }
        Ok(())
    }
}
