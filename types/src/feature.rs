use std::ops::{Index, IndexMut};

use strum::{EnumCount, EnumIter};

/// The 18 raw audio features every indexed [`crate::track::Track`] carries.
///
/// Order is significant: it is the axis order of the KD-tree and of
/// [`FeatureVector`]'s backing array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter)]
#[repr(usize)]
pub enum FeatureIndex {
    Bpm,
    Danceability,
    OnsetRate,
    BeatPunch,
    TonalClarity,
    TuningPurity,
    FifthsStrength,
    ChordStrength,
    ChordChangeRate,
    Crest,
    Entropy,
    SpectralCentroid,
    SpectralRolloff,
    SpectralKurtosis,
    SpectralEnergy,
    SpectralFlatness,
    SubDrive,
    AirSizzle,
}

pub const NUM_FEATURES: usize = FeatureIndex::COUNT;

impl FeatureIndex {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bpm => "bpm",
            Self::Danceability => "danceability",
            Self::OnsetRate => "onset_rate",
            Self::BeatPunch => "beat_punch",
            Self::TonalClarity => "tonal_clarity",
            Self::TuningPurity => "tuning_purity",
            Self::FifthsStrength => "fifths_strength",
            Self::ChordStrength => "chord_strength",
            Self::ChordChangeRate => "chord_change_rate",
            Self::Crest => "crest",
            Self::Entropy => "entropy",
            Self::SpectralCentroid => "spectral_centroid",
            Self::SpectralRolloff => "spectral_rolloff",
            Self::SpectralKurtosis => "spectral_kurtosis",
            Self::SpectralEnergy => "spectral_energy",
            Self::SpectralFlatness => "spectral_flatness",
            Self::SubDrive => "sub_drive",
            Self::AirSizzle => "air_sizzle",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().find(|f| f.name() == name)
    }

    /// Default per-dimension weight used by unweighted raw-feature searches.
    ///
    /// `bpm` dominates (0.3); every other dimension gets a small uniform
    /// weight (0.01) unless a caller supplies its own weight set.
    #[must_use]
    pub fn default_weight(self) -> f32 {
        match self {
            Self::Bpm => 0.3,
            _ => 0.01,
        }
    }
}

/// Dense 18-dimensional raw feature vector, indexable by [`FeatureIndex`] or
/// a plain `usize`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct FeatureVector(pub [f32; NUM_FEATURES]);

impl FeatureVector {
    #[must_use]
    pub fn zero() -> Self {
        Self([0.0; NUM_FEATURES])
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Default weight set: `bpm` weighted 0.3, every other dimension 0.01.
    #[must_use]
    pub fn default_weights() -> [f32; NUM_FEATURES] {
        use strum::IntoEnumIterator;
        let mut weights = [0.0_f32; NUM_FEATURES];
        for f in FeatureIndex::iter() {
            weights[f as usize] = f.default_weight();
        }
        weights
    }
}

impl Index<FeatureIndex> for FeatureVector {
    type Output = f32;
    fn index(&self, index: FeatureIndex) -> &f32 {
        &self.0[index as usize]
    }
}

impl IndexMut<FeatureIndex> for FeatureVector {
    fn index_mut(&mut self, index: FeatureIndex) -> &mut f32 {
        &mut self.0[index as usize]
    }
}

impl Index<usize> for FeatureVector {
    type Output = f32;
    fn index(&self, index: usize) -> &f32 {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn feature_count_is_eighteen() {
        assert_eq!(NUM_FEATURES, 18);
    }

    #[test]
    fn name_round_trips() {
        for f in FeatureIndex::iter() {
            assert_eq!(FeatureIndex::from_name(f.name()), Some(f));
        }
    }

    #[test]
    fn bpm_is_the_only_dominant_weight() {
        let weights = FeatureVector::default_weights();
        assert_eq!(weights[FeatureIndex::Bpm as usize], 0.3);
        for f in FeatureIndex::iter().filter(|f| *f != FeatureIndex::Bpm) {
            assert_eq!(weights[f as usize], 0.01);
        }
    }
}
