/*!
 * Core Module
 * Error types, configuration, and synchronization helpers shared by the containers
 */

pub mod config;
pub mod errors;
pub mod shard_manager;
pub mod sync;

// Re-export for convenience
pub use config::{MapConfig, VectorConfig};
pub use errors::{ContainerError, ContainerResult};
pub use shard_manager::{ShardManager, WorkloadProfile};
