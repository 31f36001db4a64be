/*!
 * Error Types
 * Container error taxonomy with thiserror, miette, and serde support
 *
 * Absence (an empty queue, a missing key) is not an error and is reported
 * through `Option`/`bool` returns. The variants here cover precondition
 * violations and invalid construction parameters only.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container operation result
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Container errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ContainerError {
    #[error("Index out of range: index {index}, len {len}")]
    #[diagnostic(
        code(container::index_out_of_range),
        help("Check the index against size() before calling at().")
    )]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid shard count: {0}")]
    #[diagnostic(
        code(container::invalid_shard_count),
        help("Shard count must be a non-zero power of 2.")
    )]
    InvalidShardCount(usize),

    #[error("Invalid bucket count: {0}")]
    #[diagnostic(
        code(container::invalid_bucket_count),
        help("Initial buckets per shard must be a non-zero power of 2.")
    )]
    InvalidBucketCount(usize),

    #[error("Invalid load factor: {0}")]
    #[diagnostic(
        code(container::invalid_load_factor),
        help("Max load factor must be a finite number of at least 0.1.")
    )]
    InvalidLoadFactor(f32),

    #[error("Invalid segment capacity: {0}")]
    #[diagnostic(
        code(container::invalid_segment_capacity),
        help("Segment capacity must be greater than zero.")
    )]
    InvalidSegmentCapacity(usize),
}

impl ContainerError {
    /// True for precondition violations raised by element access
    #[inline]
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, ContainerError::IndexOutOfRange { .. })
    }

    /// True for errors raised while validating construction parameters
    #[inline]
    pub fn is_configuration(&self) -> bool {
        !self.is_out_of_range()
    }
}
