/*!
 * Synchronization Helpers
 *
 * Small building blocks shared by the containers:
 * - Adaptive backoff for CAS retry loops and in-flight writes
 * - Cache-line padding for hot atomics
 */

mod backoff;
mod padded;

pub use backoff::Backoff;
pub use padded::CachePadded;
