//! Corpus Loader (§4, component table) and the read-only `Corpus` singleton
//! it produces: tracks, PCA weights, calibration table, and the KD-tree built
//! over them. Built once at startup and shared via `Arc` across session
//! tasks.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use drift_types::{CalibrationEntry, CalibrationTable, PcaDiscriminator, PcaWeights, Resolution, Track, TrackId};

use crate::errors::EngineError;
use crate::kdtree::KdTree;

/// What a loader must produce (§6 "Corpus loader"): tracks plus the two
/// tables needed to interpret them. The store (database, flat file,
/// whatever) that produced this is out of scope; this is a one-shot,
/// read-only handoff.
#[derive(Debug, Clone)]
pub struct LoadedCorpus {
    pub tracks: Vec<Track>,
    pub pca_weights: PcaWeights,
    pub calibration: CalibrationTable,
}

/// A read-only, one-shot loader producing a [`LoadedCorpus`] (§6). The
/// concrete store (SQL table, flat catalog file, ...) is an external
/// collaborator; this crate only depends on the trait.
pub trait CorpusLoader: Send + Sync {
    /// # Errors
    ///
    /// Returns an opaque error if the underlying store could not be read.
    fn load(&self) -> Result<LoadedCorpus, anyhow::Error>;
}

/// The startup-built, read-only index over a fixed corpus: tracks, PCA
/// weights, calibration table, and the KD-tree over the tracks' raw
/// features. Never mutated after [`Corpus::build`].
pub struct Corpus {
    tracks: Vec<Track>,
    index_by_id: HashMap<TrackId, usize>,
    pca_weights: PcaWeights,
    calibration: CalibrationTable,
    tree: KdTree,
}

impl Corpus {
    /// Build the corpus: filter to indexable tracks (§3 invariant — non-null
    /// bpm, spectral_centroid, primary_d), warn (not fail) on PCA weight
    /// mismatches beyond 1e-3, and build the KD-tree once.
    #[must_use]
    pub fn build(loaded: LoadedCorpus) -> Self {
        let LoadedCorpus { tracks, pca_weights, calibration } = loaded;
        let total = tracks.len();
        let tracks: Vec<Track> = tracks.into_iter().filter(Track::is_indexable).collect();
        if tracks.len() != total {
            log::warn!("corpus loader dropped {} non-indexable tracks out of {total}", total - tracks.len());
        }

        for track in &tracks {
            let recomputed = pca_weights.recompute_projection(&track.features);
            if (recomputed.primary_d - track.pca.primary_d).abs() > 1e-3 {
                log::warn!(
                    "track {} stored primary_d {} disagrees with recomputed {} by more than 1e-3",
                    track.id,
                    track.pca.primary_d,
                    recomputed.primary_d
                );
            }
        }

        let index_by_id = tracks.iter().enumerate().map(|(i, t)| (t.id.clone(), i)).collect();
        let tree = KdTree::build(&tracks);
        log::info!("corpus ready: {} indexable tracks", tracks.len());
        Self { tracks, index_by_id, pca_weights, calibration, tree }
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    #[must_use]
    pub fn pca_weights(&self) -> &PcaWeights {
        &self.pca_weights
    }

    #[must_use]
    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    #[must_use]
    pub fn tree(&self) -> &KdTree {
        &self.tree
    }

    #[must_use]
    pub fn index_of(&self, id: &TrackId) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if `id` is absent from the corpus.
    pub fn get(&self, id: &TrackId) -> Result<&Track, EngineError> {
        self.index_of(id).map(|i| &self.tracks[i]).ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    /// Resolve a `(resolution, discriminator)` calibration entry, or `None`
    /// if the table has no row for it (callers fall back to a
    /// feature-space radius per §4.1/§4.3).
    #[must_use]
    pub fn calibration_entry(&self, resolution: Resolution, discriminator: PcaDiscriminator) -> Option<CalibrationEntry> {
        self.calibration.get(resolution, discriminator)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// A `(resolution, discriminator)` calibration row as it appears in a JSON
/// catalog file (§6: "no schema is prescribed beyond the fields listed").
#[derive(Debug, Clone, Deserialize)]
struct CalibrationRow {
    resolution: Resolution,
    discriminator: PcaDiscriminator,
    entry: CalibrationEntry,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    tracks: Vec<Track>,
    #[serde(default)]
    pca_weights: PcaWeights,
    #[serde(default)]
    calibration: Vec<CalibrationRow>,
}

/// A minimal [`CorpusLoader`] reading a single JSON catalog file, used by
/// the daemon and CLI binaries. A database-backed loader is an equally
/// valid alternative implementation of the same trait; it's out of scope
/// here.
pub struct JsonCorpusLoader {
    path: PathBuf,
}

impl JsonCorpusLoader {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusLoader for JsonCorpusLoader {
    fn load(&self) -> Result<LoadedCorpus, anyhow::Error> {
        let raw = std::fs::read_to_string(&self.path)?;
        let catalog: CatalogFile = serde_json::from_str(&raw)?;
        let mut calibration = CalibrationTable::default();
        for row in catalog.calibration {
            calibration.insert(row.resolution, row.discriminator, row.entry);
        }
        Ok(LoadedCorpus { tracks: catalog.tracks, pca_weights: catalog.pca_weights, calibration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_types::{FeatureIndex, FeatureVector, PcaProjection, TrackMetadataBlob};
    use std::path::PathBuf;

    fn indexable_track(id: &str) -> Track {
        let mut features = FeatureVector::zero();
        features[FeatureIndex::Bpm] = 120.0;
        features[FeatureIndex::SpectralCentroid] = 2000.0;
        Track {
            id: TrackId::new(id),
            title: "t".into(),
            artist: "a".into(),
            album: "al".into(),
            album_cover_path: None,
            file_path: PathBuf::from("/x"),
            duration_seconds: 180.0,
            features,
            pca: PcaProjection { primary_d: 1.0, tonal: [0.0; 3], spectral: [0.0; 3], rhythmic: [0.0; 3] },
            vae: None,
            metadata: TrackMetadataBlob::default(),
        }
    }

    #[test]
    fn non_indexable_tracks_are_dropped() {
        let mut bad = indexable_track("bad");
        bad.features[FeatureIndex::Bpm] = 0.0;
        let loaded = LoadedCorpus {
            tracks: vec![indexable_track("good"), bad],
            pca_weights: PcaWeights::default(),
            calibration: CalibrationTable::default(),
        };
        let corpus = Corpus::build(loaded);
        assert_eq!(corpus.len(), 1);
        assert!(corpus.get(&TrackId::new("good")).is_ok());
        assert!(corpus.get(&TrackId::new("bad")).is_err());
    }

    #[test]
    fn json_loader_round_trips_a_catalog_file() {
        let track = indexable_track("json-track");
        let catalog = serde_json::json!({
            "tracks": [track],
            "pca_weights": { "components": {} },
            "calibration": [
                {
                    "resolution": "microscope",
                    "discriminator": "PrimaryD",
                    "entry": { "inner_radius": 1.0, "outer_radius": 2.0, "scaling_factor": 1.0, "achieved_percentage": 0.5 },
                },
            ],
        });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, serde_json::to_string(&catalog).unwrap()).unwrap();

        let loaded = JsonCorpusLoader::new(&path).load().unwrap();
        assert_eq!(loaded.tracks.len(), 1);
        assert!(loaded.calibration.get(Resolution::Microscope, PcaDiscriminator::PrimaryD).is_some());
    }
}
