use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::pca::PcaDiscriminator;

/// Zoom level selecting which calibration row applies to a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Microscope,
    MagnifyingGlass,
    Binoculars,
}

impl Resolution {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Microscope => "microscope",
            Self::MagnifyingGlass => "magnifying_glass",
            Self::Binoculars => "binoculars",
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::MagnifyingGlass
    }
}

/// One calibration row: the annulus radii and scaling factor for a given
/// `(resolution, discriminator)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub scaling_factor: f32,
    pub achieved_percentage: f32,
}

/// Feature-space fallback multiplier applied to `outer * scaling_factor`
/// when a directional search has no annular PCA calibration to consult.
pub const PROJECTION_FACTOR: f32 = 6.0;

/// The full calibration table keyed by `(resolution, discriminator)`.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    entries: HashMap<(Resolution, PcaDiscriminator), CalibrationEntry>,
}

impl CalibrationTable {
    pub fn insert(&mut self, resolution: Resolution, discriminator: PcaDiscriminator, entry: CalibrationEntry) {
        self.entries.insert((resolution, discriminator), entry);
    }

    #[must_use]
    pub fn get(&self, resolution: Resolution, discriminator: PcaDiscriminator) -> Option<CalibrationEntry> {
        self.entries.get(&(resolution, discriminator)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_entry_is_none() {
        let table = CalibrationTable::default();
        assert_eq!(table.get(Resolution::Microscope, PcaDiscriminator::Tonal), None);
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut table = CalibrationTable::default();
        let entry = CalibrationEntry {
            inner_radius: 1.0,
            outer_radius: 2.0,
            scaling_factor: 1.5,
            achieved_percentage: 0.8,
        };
        table.insert(Resolution::Binoculars, PcaDiscriminator::PrimaryD, entry);
        assert_eq!(table.get(Resolution::Binoculars, PcaDiscriminator::PrimaryD), Some(entry));
    }
}
