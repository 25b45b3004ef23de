//! Shared data model for the drift radio engine: tracks, PCA projections,
//! calibration tables, directions, sessions, analysis results, and the
//! broadcast event shapes. No I/O and no engine logic lives here — see
//! `drift_analysis` and `drift_core` for that.

pub mod analysis;
pub mod calibration;
pub mod direction;
pub mod errors;
pub mod event;
pub mod feature;
pub mod mixdown;
pub mod pca;
pub mod session;
pub mod track;

pub use analysis::AnalysisResult;
pub use calibration::{CalibrationEntry, CalibrationTable, Resolution};
pub use direction::{Direction, DirectionEntry, Polarity};
pub use errors::DataModelError;
pub use event::{Event, ExplorerSnapshotPayload, HeartbeatPayload, SelectionFailedPayload, SelectionReadyPayload};
pub use feature::{FeatureIndex, FeatureVector, NUM_FEATURES};
pub use mixdown::MixdownCacheEntry;
pub use pca::{PcaDiscriminator, PcaDomain, PcaProjection, PcaWeights};
pub use session::{Fingerprint, JourneyStackEntry, SessionId, SessionType};
pub use track::{Track, TrackBrief, TrackId, TrackMetadataBlob, VaeLatent};
