/*!
 * Concurrent Containers
 *
 * Three independent containers sharing one contract: every operation is
 * safe to call from any number of threads without external locking, and no
 * interleaving of mutations can corrupt the structure.
 *
 * - **LockFreeQueue**: unbounded MPMC FIFO, CAS-only, epoch reclamation
 * - **ShardedMap**: insert-if-absent hash map, one RwLock per shard
 * - **SegmentedVector**: append-only vector, atomic slot reservation
 *
 * # Absence vs. Errors
 *
 * An empty queue or a missing key is a normal outcome (`Option`/`bool`).
 * Only an impossible vector index is an error.
 */

mod map;
mod queue;
mod stats;
mod vector;

pub use map::ShardedMap;
pub use queue::LockFreeQueue;
pub use stats::{MapStats, QueueStats, VectorStats};
pub use vector::SegmentedVector;
