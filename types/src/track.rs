use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::feature::FeatureVector;
use crate::pca::PcaProjection;

/// Opaque, content-addressed track identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub Arc<str>);

impl TrackId {
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model-versioned optional latent embedding. Absent for tracks the
/// embedding model hasn't scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaeLatent {
    pub values: [f32; 8],
    pub model_version: Arc<str>,
}

/// Arbitrary catalog-specific metadata, passed through opaquely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackMetadataBlob(pub serde_json::Value);

/// An immutable track record as held in the corpus. Never mutated after
/// load; counterfactual variants are separate, transient values (see
/// `drift_core::distance::Counterfactual`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: Arc<str>,
    pub artist: Arc<str>,
    pub album: Arc<str>,
    pub album_cover_path: Option<PathBuf>,
    pub file_path: PathBuf,
    pub duration_seconds: f32,
    pub features: FeatureVector,
    pub pca: PcaProjection,
    pub vae: Option<VaeLatent>,
    pub metadata: TrackMetadataBlob,
}

impl Track {
    /// Per §3: tracks admitted to the index must have non-null bpm,
    /// spectral_centroid, and primary_d, finite and not excluded by the
    /// loader. The loader is responsible for calling this before indexing;
    /// this is a pure predicate so it can also be used in tests.
    #[must_use]
    pub fn is_indexable(&self) -> bool {
        use crate::feature::FeatureIndex;
        self.features[FeatureIndex::Bpm].is_finite()
            && self.features[FeatureIndex::Bpm] != 0.0
            && self.features[FeatureIndex::SpectralCentroid].is_finite()
            && self.features[FeatureIndex::SpectralCentroid] != 0.0
            && self.pca.primary_d.is_finite()
    }
}

/// A compact, UI-facing projection of [`Track`] used in sample lists and
/// broadcast payloads — never contains internal-only fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackBrief {
    pub id: TrackId,
    pub title: Arc<str>,
    pub artist: Arc<str>,
    pub album: Arc<str>,
    pub album_cover_path: Option<PathBuf>,
    pub duration_seconds: f32,
}

impl From<&Track> for TrackBrief {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            album_cover_path: track.album_cover_path.clone(),
            duration_seconds: track.duration_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureIndex;
    use pretty_assertions::assert_eq;

    fn sample_track() -> Track {
        let mut features = FeatureVector::zero();
        features[FeatureIndex::Bpm] = 120.0;
        features[FeatureIndex::SpectralCentroid] = 2000.0;
        Track {
            id: TrackId::new("abc"),
            title: "Title".into(),
            artist: "Artist".into(),
            album: "Album".into(),
            album_cover_path: None,
            file_path: PathBuf::from("/music/abc.mp3"),
            duration_seconds: 180.0,
            features,
            pca: PcaProjection {
                primary_d: 1.0,
                tonal: [0.0; 3],
                spectral: [0.0; 3],
                rhythmic: [0.0; 3],
            },
            vae: None,
            metadata: TrackMetadataBlob::default(),
        }
    }

    #[test]
    fn indexable_track_passes() {
        assert!(sample_track().is_indexable());
    }

    #[test]
    fn zero_bpm_is_not_indexable() {
        let mut track = sample_track();
        track.features[FeatureIndex::Bpm] = 0.0;
        assert!(!track.is_indexable());
    }

    #[test]
    fn brief_carries_display_fields_only() {
        let track = sample_track();
        let brief = TrackBrief::from(&track);
        assert_eq!(brief.id, track.id);
        assert_eq!(brief.title, track.title);
    }
}
