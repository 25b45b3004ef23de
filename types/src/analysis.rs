use serde::{Deserialize, Serialize};

/// A single detected energy peak within a decoded track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub time_seconds: f32,
    pub energy: f32,
}

/// Everything the audio analyzer derives from decoded PCM for a single
/// track. `key` is a string token (see `drift_analysis::key`): concrete
/// derivation is a chromagram-based estimate, with an explicit "unknown"
/// sentinel when it cannot be determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub bpm: u32,
    pub key: Option<String>,
    pub nominal_duration_seconds: f32,
    pub actual_duration_seconds: f32,
    pub rms: f32,
    pub peaks: Vec<Peak>,
    pub crossfade_lead_time_seconds: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn peak_is_copy() {
        let peak = Peak { time_seconds: 1.0, energy: 0.5 };
        let copy = peak;
        assert_eq!(peak, copy);
    }
}
