use thiserror::Error;

use crate::track::TrackId;

/// Errors that can arise from pure data-model operations (PCA recompute,
/// counterfactual construction). Never raised for "data looks odd" reasons
/// — only for genuine arity/shape mismatches per §7.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataModelError {
    #[error("track {0} not found in corpus")]
    NotFound(TrackId),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    VectorDimensionMismatch { expected: usize, actual: usize },
}
