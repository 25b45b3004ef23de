//! PCM-level audio analysis for the drift radio engine: BPM, key, RMS,
//! peak detection, silence trim, and the crossfade lead-time heuristic.
//! Everything here is a pure function over decoded PCM; the codec boundary
//! itself (`Codec`) lives alongside it so callers only need this crate for
//! both concerns.

pub mod bpm;
pub mod codec;
pub mod errors;
pub mod key;
pub mod lead_time;
pub mod pcm;
pub mod peaks;
pub mod rms;
pub mod silence;

use drift_types::AnalysisResult;

pub use codec::Codec;
pub use errors::{AnalysisError, CodecError};
pub use pcm::Pcm;

/// Default silence threshold (normalized amplitude) used when a caller
/// doesn't override it via configuration.
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.01;

/// Run the full analysis pipeline described in §4.7 over one decoded
/// track: silence-trim, then BPM/key/RMS/peaks/lead-time off the trimmed
/// buffer.
pub fn analyze(
    pcm_bytes: &[u8],
    sample_rate: u32,
    channels: u16,
    nominal_duration_seconds: f32,
    silence_threshold: f32,
) -> Result<AnalysisResult, AnalysisError> {
    let pcm = Pcm::new(pcm_bytes, sample_rate, channels)?;
    let (trimmed_bytes, actual_duration_seconds) = silence::trim_silence(&pcm, silence_threshold);

    if trimmed_bytes.is_empty() {
        return Ok(AnalysisResult {
            bpm: 120,
            key: None,
            nominal_duration_seconds,
            actual_duration_seconds: 0.0,
            rms: 0.0,
            peaks: Vec::new(),
            crossfade_lead_time_seconds: lead_time::crossfade_lead_time_seconds(&[], sample_rate, nominal_duration_seconds),
        });
    }

    let trimmed = Pcm::new(&trimmed_bytes, sample_rate, channels)?;
    let mono = trimmed.mono();
    let left = trimmed.channel(0);

    Ok(AnalysisResult {
        bpm: bpm::detect_bpm(&mono, sample_rate),
        key: key::detect_key(&mono, sample_rate),
        nominal_duration_seconds,
        actual_duration_seconds,
        rms: rms::rms(&mono),
        peaks: peaks::detect_peaks(&mono, sample_rate),
        crossfade_lead_time_seconds: lead_time::crossfade_lead_time_seconds(&left, sample_rate, actual_duration_seconds),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_pcm_is_an_analysis_error() {
        assert_eq!(analyze(&[], 44100, 2, 1.0, DEFAULT_SILENCE_THRESHOLD).unwrap_err(), AnalysisError::EmptySamples);
    }

    #[test]
    fn all_silent_pcm_yields_zeroed_result() {
        let bytes = vec![0u8; 44100 * 2 * 2];
        let result = analyze(&bytes, 44100, 2, 1.0, DEFAULT_SILENCE_THRESHOLD).unwrap();
        assert_eq!(result.bpm, 120);
        assert_eq!(result.key, None);
        assert_eq!(result.actual_duration_seconds, 0.0);
    }
}
