//! Directional Search (§4.3): given a current track and a direction label,
//! produce a ranked candidate list representing motion along a named axis.

use drift_types::{FeatureIndex, FeatureVector, PcaDiscriminator, Polarity, Resolution, Track};

use crate::corpus::Corpus;
use crate::distance::Counterfactual;
use crate::errors::EngineError;
use crate::kdtree::weighted_feature_distance;

/// Feature-space fallback radius when no calibration entry is available.
pub const FALLBACK_RADIUS: f32 = 2.0;
pub const DIRECTIONAL_SEARCH_LIMIT: usize = 500;
pub const DIRECTIONAL_RESULT_LIMIT: usize = 20;

/// A candidate produced by directional search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalCandidate {
    pub track_index: usize,
    pub delta: f32,
    pub primary_distance: f32,
    pub rank_distance: f32,
}

#[derive(Debug, Clone)]
pub struct DirectionalResult {
    pub candidates: Vec<DirectionalCandidate>,
    pub total_available: usize,
}

/// Resolve a human direction label to a `(dimension, polarity)` pair via the
/// fixed lexicon in §4.3 step 1. Unknown labels default to `bpm` (polarity
/// defaults to positive, since there is no signed fallback convention).
#[must_use]
pub fn resolve_label(label: &str) -> (FeatureIndex, Polarity) {
    use FeatureIndex::{
        AirSizzle, BeatPunch, Bpm, ChordChangeRate, ChordStrength, Crest, Danceability, Entropy, FifthsStrength,
        OnsetRate, SpectralCentroid, SpectralEnergy, SpectralFlatness, SpectralKurtosis, SpectralRolloff, SubDrive,
        TonalClarity, TuningPurity,
    };
    use Polarity::{Negative, Positive};
    match label {
        "faster" => (Bpm, Positive),
        "slower" => (Bpm, Negative),
        "more_danceable" => (Danceability, Positive),
        "less_danceable" => (Danceability, Negative),
        "busier" | "more_onsets" => (OnsetRate, Positive),
        "sparser" | "fewer_onsets" => (OnsetRate, Negative),
        "punchier" => (BeatPunch, Positive),
        "softer_hits" => (BeatPunch, Negative),
        "more_tonal" => (TonalClarity, Positive),
        "less_tonal" | "more_atonal" => (TonalClarity, Negative),
        "more_in_tune" => (TuningPurity, Positive),
        "less_in_tune" => (TuningPurity, Negative),
        "more_fifths" | "more_circle_of_fifths" => (FifthsStrength, Positive),
        "fewer_fifths" => (FifthsStrength, Negative),
        "stronger_chords" => (ChordStrength, Positive),
        "weaker_chords" => (ChordStrength, Negative),
        "faster_chord_changes" => (ChordChangeRate, Positive),
        "slower_chord_changes" => (ChordChangeRate, Negative),
        "more_dynamic" | "crestier" => (Crest, Positive),
        "more_compressed" => (Crest, Negative),
        "more_complex" => (Entropy, Positive),
        "simpler" | "more_predictable" => (Entropy, Negative),
        "brighter" => (SpectralCentroid, Positive),
        "darker" => (SpectralCentroid, Negative),
        "more_rolloff" | "airier_rolloff" => (SpectralRolloff, Positive),
        "less_rolloff" => (SpectralRolloff, Negative),
        "peakier" | "more_kurtosis" => (SpectralKurtosis, Positive),
        "flatter_kurtosis" => (SpectralKurtosis, Negative),
        "more_energetic" => (SpectralEnergy, Positive),
        "less_energetic" | "calmer" => (SpectralEnergy, Negative),
        "noisier" | "more_flat" => (SpectralFlatness, Positive),
        "more_tonal_spectrum" | "less_flat" => (SpectralFlatness, Negative),
        "bassier" | "more_sub" => (SubDrive, Positive),
        "less_bass" => (SubDrive, Negative),
        "airier" | "more_air" => (AirSizzle, Positive),
        "less_air" | "duller" => (AirSizzle, Negative),
        _ => (Bpm, Positive),
    }
}

/// Inner annulus radius for the calibrated `(resolution, primary_d)` entry,
/// scaled, or [`FALLBACK_RADIUS`] when no calibration row exists.
fn inner_radius_for(corpus: &Corpus, resolution: Resolution) -> f32 {
    corpus
        .calibration_entry(resolution, PcaDiscriminator::PrimaryD)
        .map_or(FALLBACK_RADIUS, |entry| entry.inner_radius * entry.scaling_factor)
}

/// Run the full directional-search algorithm (§4.3 steps 1-7) for `current`
/// along `direction_label` at `resolution`.
///
/// # Errors
///
/// Returns [`EngineError::IndexNotInitialized`] if the corpus has no tracks.
/// An empty neighborhood is otherwise not an error — it yields an empty
/// result.
pub fn directional_search(
    corpus: &Corpus,
    current: &Track,
    direction_label: &str,
    resolution: Resolution,
) -> Result<DirectionalResult, EngineError> {
    let (dimension, polarity) = resolve_label(direction_label);
    search_dimension(corpus, current, dimension, polarity, resolution)
}

/// The same algorithm as [`directional_search`] but addressed directly by
/// `(dimension, polarity)`, skipping label resolution. Used by the explorer
/// aggregator, which enumerates all 18 × 2 original-feature directions
/// without going through the lexicon.
///
/// # Errors
///
/// Returns [`EngineError::IndexNotInitialized`] if the corpus has no tracks.
pub fn search_dimension(
    corpus: &Corpus,
    current: &Track,
    dimension: FeatureIndex,
    polarity: Polarity,
    resolution: Resolution,
) -> Result<DirectionalResult, EngineError> {
    let inner_radius = inner_radius_for(corpus, resolution);

    let projection_radius = corpus.calibration_entry(resolution, PcaDiscriminator::PrimaryD).map_or(FALLBACK_RADIUS, |entry| {
        entry.outer_radius * entry.scaling_factor * drift_types::calibration::PROJECTION_FACTOR
    });

    let neighborhood = corpus.tree().radius_search(
        corpus.tracks(),
        &current.features,
        corpus.index_of(&current.id),
        projection_radius,
        None,
        DIRECTIONAL_SEARCH_LIMIT,
    )?;

    let pca_weights = corpus.pca_weights();

    // Step 4: sign + nonzero delta filter.
    let signed: Vec<(usize, f32)> = neighborhood
        .iter()
        .filter_map(|hit| {
            let candidate = &corpus.tracks()[hit.track_index];
            let delta = candidate.features[dimension] - current.features[dimension];
            let sign_ok = match polarity {
                Polarity::Positive => delta > 0.0,
                Polarity::Negative => delta < 0.0,
            };
            (sign_ok && delta != 0.0).then_some((hit.track_index, delta))
        })
        .collect();

    // Step 5: locality filter — isolated PCA distance on every other active
    // dimension must stay within inner_radius.
    use strum::IntoEnumIterator;
    let locality_checked: Vec<(usize, f32, f32)> = signed
        .into_iter()
        .filter_map(|(track_index, delta)| {
            let candidate = &corpus.tracks()[track_index];
            let mut rejected = false;
            for other in FeatureIndex::iter().filter(|d| *d != dimension) {
                let value = candidate.features[other];
                let counterfactual = Counterfactual::with_feature_overrides(current, &[(other, value)], pca_weights);
                let isolated = (counterfactual.base.pca.primary_d - current.pca.primary_d).abs();
                if isolated > inner_radius {
                    rejected = true;
                    break;
                }
            }
            if rejected {
                return None;
            }
            let primary_distance = (candidate.pca.primary_d - current.pca.primary_d).abs();
            Some((track_index, delta, primary_distance))
        })
        .collect();

    let rejection_rate = if signed_total(&neighborhood) > 0 {
        1.0 - (locality_checked.len() as f32 / signed_total(&neighborhood) as f32)
    } else {
        0.0
    };
    log::debug!(
        "directional search '{direction_label}' locality filter rejection rate: {:.1}%",
        rejection_rate * 100.0
    );

    if locality_checked.is_empty() {
        return Ok(DirectionalResult { candidates: Vec::new(), total_available: 0 });
    }

    // Step 6: minimum-delta threshold.
    let min_delta = minimum_delta(&locality_checked, inner_radius);

    let passed: Vec<(usize, f32, f32)> = locality_checked
        .into_iter()
        .filter(|(_, delta, primary_distance)| delta.abs() >= 0.999 * min_delta && *primary_distance >= 0.95 * inner_radius)
        .collect();

    let total_available = passed.len();

    // Step 7: rank by "D-minus-i" similarity: weighted sum over the active
    // 17 dimensions excluding the direction dimension (ascending = closer).
    let mut dims_weights = FeatureVector::default_weights();
    dims_weights[dimension as usize] = 0.0;

    let mut ranked: Vec<DirectionalCandidate> = passed
        .into_iter()
        .map(|(track_index, delta, primary_distance)| {
            let candidate = &corpus.tracks()[track_index];
            let rank_distance = weighted_feature_distance(&current.features, &candidate.features, &dims_weights);
            DirectionalCandidate { track_index, delta, primary_distance, rank_distance }
        })
        .collect();
    ranked.sort_by(|a, b| a.rank_distance.partial_cmp(&b.rank_distance).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(DIRECTIONAL_RESULT_LIMIT);

    Ok(DirectionalResult { candidates: ranked, total_available })
}

fn signed_total(neighborhood: &[crate::kdtree::ScoredTrack]) -> usize {
    neighborhood.len()
}

/// Population minimum delta (§4.3 step 6): if `inner_radius > 0`, the median
/// `delta/primary_distance` ratio times `inner_radius`; otherwise the 25th
/// percentile of observed deltas.
fn minimum_delta(candidates: &[(usize, f32, f32)], inner_radius: f32) -> f32 {
    if inner_radius > 0.0 {
        let mut ratios: Vec<f32> = candidates
            .iter()
            .filter(|(_, _, primary_distance)| *primary_distance > 0.0)
            .map(|(_, delta, primary_distance)| delta.abs() / primary_distance)
            .collect();
        if !ratios.is_empty() {
            ratios.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let median = ratios[ratios.len() / 2];
            return median * inner_radius;
        }
    }
    let mut deltas: Vec<f32> = candidates.iter().map(|(_, delta, _)| delta.abs()).collect();
    if deltas.is_empty() {
        return 0.0;
    }
    deltas.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((deltas.len() as f32) * 0.25).floor() as usize;
    deltas[idx.min(deltas.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_types::{CalibrationTable, PcaProjection, PcaWeights, TrackId, TrackMetadataBlob};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn track(id: &str, bpm: f32, centroid: f32) -> Track {
        let mut features = FeatureVector::zero();
        features[FeatureIndex::Bpm] = bpm;
        features[FeatureIndex::SpectralCentroid] = centroid;
        Track {
            id: TrackId::new(id),
            title: "t".into(),
            artist: "a".into(),
            album: "al".into(),
            album_cover_path: None,
            file_path: PathBuf::from("/x"),
            duration_seconds: 180.0,
            features,
            pca: PcaProjection { primary_d: bpm, tonal: [0.0; 3], spectral: [0.0; 3], rhythmic: [0.0; 3] },
            vae: None,
            metadata: TrackMetadataBlob::default(),
        }
    }

    #[test]
    fn unknown_label_resolves_to_bpm() {
        assert_eq!(resolve_label("nonexistent_direction"), (FeatureIndex::Bpm, Polarity::Positive));
    }

    #[test]
    fn faster_resolves_to_bpm_positive() {
        assert_eq!(resolve_label("faster"), (FeatureIndex::Bpm, Polarity::Positive));
    }

    #[test]
    fn darker_resolves_to_spectral_centroid_negative() {
        assert_eq!(resolve_label("darker"), (FeatureIndex::SpectralCentroid, Polarity::Negative));
    }

    #[test]
    fn track_outside_the_corpus_still_runs_against_it() {
        let loaded = crate::corpus::LoadedCorpus {
            tracks: vec![track("a", 120.0, 2000.0)],
            pca_weights: PcaWeights::default(),
            calibration: CalibrationTable::default(),
        };
        let corpus = Corpus::build(loaded);
        let ghost = track("ghost", 100.0, 1000.0);
        let result = directional_search(&corpus, &ghost, "faster", Resolution::MagnifyingGlass);
        assert!(result.is_ok());
    }

    #[test]
    fn empty_neighborhood_is_not_an_error() {
        let loaded = crate::corpus::LoadedCorpus {
            tracks: vec![track("a", 120.0, 2000.0)],
            pca_weights: PcaWeights::default(),
            calibration: CalibrationTable::default(),
        };
        let corpus = Corpus::build(loaded);
        let current = corpus.tracks()[0].clone();
        let result = directional_search(&corpus, &current, "faster", Resolution::MagnifyingGlass).unwrap();
        assert_eq!(result.candidates.len(), 0);
    }
}
