/*!
 * HCSTL: High-Concurrency Containers
 *
 * Shared-memory container primitives for heavily threaded code:
 * - [`LockFreeQueue`]: unbounded lock-free MPMC FIFO queue
 * - [`ShardedMap`]: hash map split across independently locked shards
 * - [`SegmentedVector`]: append-only vector with atomic slot reservation
 *
 * The containers are independent of one another and can be used alone.
 */

pub mod containers;
pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::config::{MapConfig, VectorConfig};
pub use crate::core::errors::{ContainerError, ContainerResult};
pub use crate::core::shard_manager::{ShardManager, WorkloadProfile};
pub use containers::{
    LockFreeQueue, MapStats, QueueStats, SegmentedVector, ShardedMap, VectorStats,
};
pub use monitoring::init_tracing;
