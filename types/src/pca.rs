use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::feature::FeatureIndex;

/// A track's precomputed PCA projection: one scalar "primary" discriminator
/// plus three 3-vectors, one per PCA domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PcaProjection {
    pub primary_d: f32,
    pub tonal: [f32; 3],
    pub spectral: [f32; 3],
    pub rhythmic: [f32; 3],
}

impl PcaProjection {
    #[must_use]
    pub fn domain(&self, domain: PcaDomain) -> Option<[f32; 3]> {
        match domain {
            PcaDomain::Tonal => Some(self.tonal),
            PcaDomain::Spectral => Some(self.spectral),
            PcaDomain::Rhythmic => Some(self.rhythmic),
        }
    }

    #[must_use]
    pub fn domain_mut(&mut self, domain: PcaDomain) -> &mut [f32; 3] {
        match domain {
            PcaDomain::Tonal => &mut self.tonal,
            PcaDomain::Spectral => &mut self.spectral,
            PcaDomain::Rhythmic => &mut self.rhythmic,
        }
    }
}

/// A PCA domain that projects onto a 3-vector. `primary_d` is a scalar and
/// is addressed separately as it is not one of these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PcaDomain {
    Tonal,
    Spectral,
    Rhythmic,
}

impl PcaDomain {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Tonal => "tonal",
            Self::Spectral => "spectral",
            Self::Rhythmic => "rhythmic",
        }
    }
}

/// The discriminator addressed by a calibration entry or an annular PCA
/// search: `primary_d` or one of the three 3-vector domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PcaDiscriminator {
    PrimaryD,
    Tonal,
    Spectral,
    Rhythmic,
}

impl PcaDiscriminator {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PrimaryD => "primary_d",
            Self::Tonal => "tonal",
            Self::Spectral => "spectral",
            Self::Rhythmic => "rhythmic",
        }
    }

    #[must_use]
    pub fn domain(self) -> Option<PcaDomain> {
        match self {
            Self::PrimaryD => None,
            Self::Tonal => Some(PcaDomain::Tonal),
            Self::Spectral => Some(PcaDomain::Spectral),
            Self::Rhythmic => Some(PcaDomain::Rhythmic),
        }
    }
}

/// A single PCA component's linear weight vector over the 18 raw features,
/// e.g. the `tonal[1]` component's weight on `bpm`.
pub type ComponentWeights = HashMap<String, f32>;

/// Mapping component-name (`"primary_d"`, `"tonal_1"`, `"spectral_2"`, ...)
/// to its linear weights over the named raw features. Used to recompute any
/// PCA component from a (possibly counterfactual) feature vector without
/// re-fitting a model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PcaWeights {
    pub components: HashMap<String, ComponentWeights>,
}

impl PcaWeights {
    /// Recompute a named component as `Σ weight(feature) * value(feature)`.
    /// Missing weights are treated as zero; returns `None` if the component
    /// itself is unknown.
    #[must_use]
    pub fn recompute(&self, component: &str, features: &crate::feature::FeatureVector) -> Option<f32> {
        let weights = self.components.get(component)?;
        let mut acc = 0.0_f32;
        for (name, weight) in weights {
            if let Some(idx) = FeatureIndex::from_name(name) {
                acc += weight * features[idx];
            }
        }
        Some(acc)
    }

    /// Recompute the full [`PcaProjection`] for a feature vector. Domain
    /// components follow the naming convention `"{domain}_{1|2|3}"`.
    #[must_use]
    pub fn recompute_projection(&self, features: &crate::feature::FeatureVector) -> PcaProjection {
        let mut projection = PcaProjection {
            primary_d: self.recompute("primary_d", features).unwrap_or(0.0),
            tonal: [0.0; 3],
            spectral: [0.0; 3],
            rhythmic: [0.0; 3],
        };
        for domain in [PcaDomain::Tonal, PcaDomain::Spectral, PcaDomain::Rhythmic] {
            let slot = projection.domain_mut(domain);
            for (i, component) in slot.iter_mut().enumerate() {
                let key = format!("{}_{}", domain.name(), i + 1);
                *component = self.recompute(&key, features).unwrap_or(0.0);
            }
        }
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{FeatureIndex, FeatureVector};
    use pretty_assertions::assert_eq;

    fn weights_for(pairs: &[(&str, f32)]) -> ComponentWeights {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn recompute_primary_d_matches_manual_dot_product() {
        let mut weights = PcaWeights::default();
        weights
            .components
            .insert("primary_d".to_string(), weights_for(&[("bpm", 0.5), ("entropy", 0.25)]));

        let mut features = FeatureVector::zero();
        features[FeatureIndex::Bpm] = 120.0;
        features[FeatureIndex::Entropy] = 4.0;

        let recomputed = weights.recompute("primary_d", &features).unwrap();
        assert_eq!(recomputed, 120.0 * 0.5 + 4.0 * 0.25);
    }

    #[test]
    fn unknown_component_returns_none() {
        let weights = PcaWeights::default();
        assert_eq!(weights.recompute("nonexistent", &FeatureVector::zero()), None);
    }
}
