const RMS_WINDOW_SAMPLES: usize = 1024;
const RMS_HOP_SAMPLES: usize = RMS_WINDOW_SAMPLES / 2;
const CANDIDATE_WINDOWS_SECONDS: [f32; 4] = [4.0, 8.0, 16.0, 32.0];
const QUIET_RATIO_THRESHOLD: f32 = 0.25;
const FALLBACK_NO_QUIET_ENDING_SECONDS: f32 = 6.0;
const DEFAULT_NO_BUFFER_SECONDS: f32 = 8.0;

fn window_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Crossfade lead-time heuristic (§4.7): find the shortest "quiet ending"
/// window whose RMS has dropped to less than a quarter of the track's peak
/// RMS, and start the crossfade `w + 1` seconds before the end. Falls back
/// to 6s if the track never gets quiet, and 8s when there's no buffer at
/// all (e.g. analysis hasn't completed yet).
#[must_use]
pub fn crossfade_lead_time_seconds(left_channel: &[f32], sample_rate: u32, duration_seconds: f32) -> f32 {
    if left_channel.is_empty() || sample_rate == 0 {
        return DEFAULT_NO_BUFFER_SECONDS;
    }

    let peak_rms = left_channel
        .windows(RMS_WINDOW_SAMPLES)
        .step_by(RMS_HOP_SAMPLES)
        .map(window_rms)
        .fold(0.0_f32, f32::max);

    if peak_rms <= 0.0 {
        return FALLBACK_NO_QUIET_ENDING_SECONDS;
    }

    for &w in &CANDIDATE_WINDOWS_SECONDS {
        if w >= duration_seconds - 2.0 {
            continue;
        }
        let window_samples = (w * sample_rate as f32) as usize;
        if window_samples == 0 || window_samples > left_channel.len() {
            continue;
        }
        let tail = &left_channel[left_channel.len() - window_samples..];
        let ratio = window_rms(tail) / peak_rms;
        if ratio < QUIET_RATIO_THRESHOLD {
            return w + 1.0;
        }
    }
    FALLBACK_NO_QUIET_ENDING_SECONDS
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_buffer_returns_default() {
        assert_eq!(crossfade_lead_time_seconds(&[], 44100, 180.0), DEFAULT_NO_BUFFER_SECONDS);
    }

    #[test]
    fn loud_track_with_no_quiet_ending_falls_back_to_six() {
        let sample_rate = 1000u32;
        let samples = vec![0.8_f32; sample_rate as usize * 60];
        let lead = crossfade_lead_time_seconds(&samples, sample_rate, 60.0);
        assert_eq!(lead, FALLBACK_NO_QUIET_ENDING_SECONDS);
    }

    #[test]
    fn fade_out_ending_is_detected() {
        let sample_rate = 1000u32;
        let mut samples = vec![0.9_f32; sample_rate as usize * 60];
        let fade_start = samples.len() - sample_rate as usize * 10;
        for s in &mut samples[fade_start..] {
            *s = 0.01;
        }
        let lead = crossfade_lead_time_seconds(&samples, sample_rate, 60.0);
        assert!(lead < FALLBACK_NO_QUIET_ENDING_SECONDS);
    }
}
