use drift_types::TrackId;
use thiserror::Error;

/// The engine-wide error taxonomy (§7). `IndexNotInitialized` and
/// `VectorDimensionMismatch` are programmer errors — callers should treat
/// them as bugs, not recoverable conditions; everything else is a normal
/// part of the session lifecycle and is handled by falling back or
/// broadcasting a `selection_failed` event rather than propagating.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("track {0} not found in corpus")]
    NotFound(TrackId),

    #[error("kd-tree index not initialized")]
    IndexNotInitialized,

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    VectorDimensionMismatch { expected: usize, actual: usize },

    #[error("codec failure while loading {track_id}: {source}")]
    CodecFailure {
        track_id: TrackId,
        #[source]
        source: drift_analysis::CodecError,
    },

    #[error("selection could not complete for {track_id}: {reason}")]
    SelectionFailed { track_id: TrackId, reason: String },

    #[error("exploration produced no candidates in any direction")]
    ExplorationEmpty,

    #[error("noise fallback rate limit tripped; stopping session")]
    RateLimitedNoise,
}

impl From<drift_types::DataModelError> for EngineError {
    fn from(value: drift_types::DataModelError) -> Self {
        match value {
            drift_types::DataModelError::NotFound(id) => Self::NotFound(id),
            drift_types::DataModelError::VectorDimensionMismatch { expected, actual } => {
                Self::VectorDimensionMismatch { expected, actual }
            }
        }
    }
}
