//! Distance & Contribution Engine (§4.2): weighted feature distance, PCA
//! distance, VAE distance, counterfactual pseudo-tracks, and per-dimension
//! contribution-fraction breakdowns for UI/diagnostics.

use drift_types::{FeatureIndex, FeatureVector, NUM_FEATURES, PcaDiscriminator, PcaDomain, PcaWeights, Track};

use crate::kdtree::{euclidean, pca_distance, weighted_feature_distance};

/// A transient, non-indexed pseudo-track produced by overriding one or more
/// features (or, for diagnostics only, a PCA coordinate) of a real track.
/// Never inserted into the corpus or passed to KD-tree search.
#[derive(Debug, Clone)]
pub struct Counterfactual {
    pub base: Track,
}

impl Counterfactual {
    /// Override a set of raw features on `base` and recompute its full PCA
    /// projection from `weights`. Total, no I/O. Overriding the empty set
    /// returns a counterfactual whose `primary_d` equals the base's within
    /// 1e-6 (§3 invariant).
    #[must_use]
    pub fn with_feature_overrides(base: &Track, overrides: &[(FeatureIndex, f32)], weights: &PcaWeights) -> Self {
        let mut features = base.features;
        for &(index, value) in overrides {
            features[index] = value;
        }
        let mut track = base.clone();
        track.features = features;
        track.pca = weights.recompute_projection(&features);
        Self { base: track }
    }

    /// Diagnostic-only: mutate a single PCA coordinate without re-deriving
    /// features (§9 "Counterfactual with PCA mutated independently of
    /// features"). Must never be used in search — only in contribution
    /// breakdowns.
    #[must_use]
    pub fn with_pca_override(base: &Track, domain: PcaDomain, component_index: usize, value: f32) -> Self {
        let mut track = base.clone();
        let slot = track.pca.domain_mut(domain);
        if let Some(entry) = slot.get_mut(component_index) {
            *entry = value;
        }
        Self { base: track }
    }
}

/// One dimension's contribution to the distance between a current track and
/// a candidate (§4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionSlice {
    pub value: f32,
    pub delta: f32,
    pub distance: f32,
    pub fraction: f32,
    pub relative: Option<f32>,
}

/// Isolated contribution of each of the 18 raw features to the distance
/// between `current` and `candidate`: for each dimension, build a
/// counterfactual that changes only that dimension to the candidate's
/// value, and measure the resulting PCA distance on `primary_d` (the
/// "isolated" distance).
#[must_use]
pub fn feature_contribution_slices(
    current: &Track,
    candidate: &Track,
    weights: &PcaWeights,
    total_distance: f32,
    reference_distance: Option<f32>,
) -> Vec<(FeatureIndex, ContributionSlice)> {
    use strum::IntoEnumIterator;
    FeatureIndex::iter()
        .map(|dim| {
            let value = candidate.features[dim];
            let delta = value - current.features[dim];
            let counterfactual = Counterfactual::with_feature_overrides(current, &[(dim, value)], weights);
            let distance = (counterfactual.base.pca.primary_d - current.pca.primary_d).abs();
            let fraction = if total_distance > 0.0 { (distance / total_distance).min(1.0) } else { 0.0 };
            let relative = reference_distance.filter(|r| *r > 0.0).map(|r| distance / r);
            (dim, ContributionSlice { value, delta, distance, fraction, relative })
        })
        .collect()
}

/// Diagnostic-only PCA-slice contribution (§4.2): for one domain's three
/// components, mutate exactly one PCA coordinate (without touching
/// features) to the candidate's value and measure the Euclidean distance
/// this produces in that domain. Per §9, this must not feed back into
/// search — it exists purely to explain "why" a candidate scored as it did.
#[must_use]
pub fn pca_contribution_slices(
    current: &Track,
    candidate: &Track,
    domain: PcaDomain,
    total_distance: f32,
) -> Vec<ContributionSlice> {
    let current_domain = current.pca.domain(domain).unwrap_or([0.0; 3]);
    let candidate_domain = candidate.pca.domain(domain).unwrap_or([0.0; 3]);
    (0..3)
        .map(|i| {
            let value = candidate_domain[i];
            let delta = value - current_domain[i];
            let counterfactual = Counterfactual::with_pca_override(current, domain, i, value);
            let mutated = counterfactual.base.pca.domain(domain).unwrap_or([0.0; 3]);
            let distance = euclidean(&current_domain, &mutated);
            let fraction = if total_distance > 0.0 { (distance / total_distance).min(1.0) } else { 0.0 };
            ContributionSlice { value, delta, distance, fraction, relative: None }
        })
        .collect()
}

#[must_use]
pub fn feature_distance(a: &FeatureVector, b: &FeatureVector, weights: &[f32; NUM_FEATURES]) -> f32 {
    weighted_feature_distance(a, b, weights)
}

#[must_use]
pub fn pca_domain_distance(a: &Track, b: &Track, discriminator: PcaDiscriminator) -> f32 {
    pca_distance(&a.pca, &b.pca, discriminator)
}

#[must_use]
pub fn vae_distance(a: &[f32; 8], b: &[f32; 8]) -> f32 {
    euclidean(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_types::{FeatureIndex, PcaProjection, TrackId, TrackMetadataBlob};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn track(id: &str) -> Track {
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
    fn empty_override_preserves_primary_d_within_tolerance() {
        let base = track("a");
        let weights = PcaWeights::default();
        let counterfactual = Counterfactual::with_feature_overrides(&base, &[], &weights);
        assert!((counterfactual.base.pca.primary_d - base.pca.primary_d).abs() < 1e-6);
    }

    #[test]
    fn feature_override_changes_only_targeted_dimension() {
        let base = track("a");
        let weights = PcaWeights::default();
        let counterfactual = Counterfactual::with_feature_overrides(&base, &[(FeatureIndex::Bpm, 140.0)], &weights);
        assert_eq!(counterfactual.base.features[FeatureIndex::Bpm], 140.0);
        assert_eq!(counterfactual.base.features[FeatureIndex::SpectralCentroid], base.features[FeatureIndex::SpectralCentroid]);
    }

    #[test]
    fn pca_override_does_not_touch_features() {
        let base = track("a");
        let counterfactual = Counterfactual::with_pca_override(&base, PcaDomain::Tonal, 0, 5.0);
        assert_eq!(counterfactual.base.features, base.features);
        assert_eq!(counterfactual.base.pca.tonal[0], 5.0);
    }

    #[test]
    fn feature_contribution_slices_cover_all_eighteen_dimensions() {
        let current = track("a");
        let mut candidate = track("b");
        candidate.features[FeatureIndex::Bpm] = 130.0;
        let weights = PcaWeights::default();
        let slices = feature_contribution_slices(&current, &candidate, &weights, 1.0, Some(2.0));
        assert_eq!(slices.len(), drift_types::NUM_FEATURES);
    }
}
