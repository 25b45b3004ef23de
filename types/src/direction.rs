use serde::{Deserialize, Serialize};

use crate::pca::PcaDomain;
use crate::track::TrackBrief;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }

    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }

    #[must_use]
    pub fn sign(self) -> f32 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

/// A tagged, one-way axis of motion through feature/PCA/VAE space. Replaces
/// the duck-typed string keys of the original with a closed variant set;
/// `to_key` produces the textual projection used by the UI only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Feature {
        feature_index: usize,
        polarity: Polarity,
    },
    Pca {
        domain: PcaDomain,
        component_index: usize, // 0..3
        polarity: Polarity,
    },
    Vae {
        axis_index: usize, // 0..8
        polarity: Polarity,
    },
}

impl Direction {
    /// One-way textual projection for the UI, e.g. `"spectral_pc2_negative"`.
    #[must_use]
    pub fn to_key(self, feature_name: impl Fn(usize) -> &'static str) -> String {
        match self {
            Self::Feature { feature_index, polarity } => {
                format!("{}_{}", feature_name(feature_index), polarity.suffix())
            }
            Self::Pca { domain, component_index, polarity } => {
                format!("{}_pc{}_{}", domain.name(), component_index + 1, polarity.suffix())
            }
            Self::Vae { axis_index, polarity } => {
                format!("vae_latent_{}_{}", axis_index, polarity.suffix())
            }
        }
    }

    #[must_use]
    pub fn polarity(self) -> Polarity {
        match self {
            Self::Feature { polarity, .. } | Self::Pca { polarity, .. } | Self::Vae { polarity, .. } => polarity,
        }
    }

    #[must_use]
    pub fn with_polarity(self, polarity: Polarity) -> Self {
        match self {
            Self::Feature { feature_index, .. } => Self::Feature { feature_index, polarity },
            Self::Pca { domain, component_index, .. } => Self::Pca { domain, component_index, polarity },
            Self::Vae { axis_index, .. } => Self::Vae { axis_index, polarity },
        }
    }

    #[must_use]
    pub fn domain_label(self) -> &'static str {
        match self {
            Self::Feature { .. } => "original",
            Self::Pca { domain, .. } => domain.name(),
            Self::Vae { .. } => "vae",
        }
    }
}

/// One fully-populated exploration direction, as returned by the explorer
/// aggregator and sent to subscribers as part of an explorer snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionEntry {
    pub key: String,
    pub label: String,
    pub description: String,
    pub domain: &'static str,
    pub direction: Direction,
    pub track_count: usize,
    pub total_neighborhood_size: usize,
    pub diversity_score: f32,
    pub split_ratio: f32,
    pub is_outlier: bool,
    pub sample_tracks: Vec<TrackBrief>,
    pub opposite_direction: Option<Box<DirectionEntry>>,
}

impl DirectionEntry {
    #[must_use]
    pub fn split_ratio_of(track_count: usize, neighborhood_size: usize) -> f32 {
        if neighborhood_size == 0 {
            0.0
        } else {
            track_count as f32 / neighborhood_size as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flip_is_involutive() {
        assert_eq!(Polarity::Positive.flip().flip(), Polarity::Positive);
    }

    #[test]
    fn feature_direction_key_uses_feature_name() {
        let direction = Direction::Feature { feature_index: 0, polarity: Polarity::Positive };
        assert_eq!(direction.to_key(|_| "bpm"), "bpm_positive");
    }

    #[test]
    fn pca_direction_key_includes_domain_and_component() {
        let direction = Direction::Pca { domain: PcaDomain::Spectral, component_index: 1, polarity: Polarity::Negative };
        assert_eq!(direction.to_key(|_| ""), "spectral_pc2_negative");
    }

    #[test]
    fn split_ratio_of_empty_neighborhood_is_zero() {
        assert_eq!(DirectionEntry::split_ratio_of(5, 0), 0.0);
    }
}
