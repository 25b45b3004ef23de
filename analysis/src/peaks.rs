use drift_types::analysis::Peak;

const PEAK_WINDOW_SECONDS: f32 = 0.05;
const PEAK_ABSOLUTE_THRESHOLD: f32 = 0.1;

/// 50ms sliding-window peak detection (§4.7): a window is a peak if its
/// energy exceeds both neighbors and an absolute threshold.
#[must_use]
pub fn detect_peaks(mono: &[f32], sample_rate: u32) -> Vec<Peak> {
    let window_samples = ((sample_rate as f32) * PEAK_WINDOW_SECONDS).round().max(1.0) as usize;
    if mono.len() < window_samples {
        return Vec::new();
    }

    let energies: Vec<f32> = mono
        .windows(window_samples)
        .step_by(window_samples)
        .map(|window| window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32)
        .collect();

    let mut peaks = Vec::new();
    for i in 1..energies.len().saturating_sub(1) {
        let energy = energies[i];
        if energy > energies[i - 1] && energy > energies[i + 1] && energy > PEAK_ABSOLUTE_THRESHOLD {
            let time_seconds = (i * window_samples) as f32 / sample_rate as f32;
            peaks.push(Peak { time_seconds, energy });
        }
    }
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn silent_buffer_has_no_peaks() {
        let mono = vec![0.0_f32; 44100];
        assert_eq!(detect_peaks(&mono, 44100), Vec::new());
    }

    #[test]
    fn single_loud_window_surrounded_by_silence_is_a_peak() {
        let sample_rate = 44100u32;
        let window_samples = (sample_rate as f32 * PEAK_WINDOW_SECONDS) as usize;
        let mut mono = vec![0.0_f32; window_samples * 5];
        for s in &mut mono[window_samples * 2..window_samples * 3] {
            *s = 0.9;
        }
        let peaks = detect_peaks(&mono, sample_rate);
        assert_eq!(peaks.len(), 1);
    }
}
