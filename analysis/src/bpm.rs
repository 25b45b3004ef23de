/// Non-overlapping window length used to build the energy series that the
/// BPM detector's autocorrelation runs over.
const ENERGY_WINDOW_SECONDS: f32 = 0.1;

const BPM_MIN: u32 = 60;
const BPM_MAX: u32 = 180;

const DEFAULT_BPM: u32 = 120;

/// Mean-square energy per `ENERGY_WINDOW_SECONDS` non-overlapping window.
fn energy_series(mono: &[f32], sample_rate: u32) -> Vec<f32> {
    let window_samples = ((sample_rate as f32) * ENERGY_WINDOW_SECONDS).round().max(1.0) as usize;
    mono.chunks(window_samples)
        .map(|window| window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32)
        .collect()
}

fn autocorrelation(series: &[f32], lag: usize) -> f32 {
    if lag == 0 || lag >= series.len() {
        return 0.0;
    }
    let n = series.len() - lag;
    if n == 0 {
        return 0.0;
    }
    series.iter().zip(series.iter().skip(lag)).map(|(a, b)| a * b).sum::<f32>() / n as f32
}

fn has_clear_peak(series: &[f32]) -> bool {
    if series.len() < 2 {
        return false;
    }
    let mean = series.iter().sum::<f32>() / series.len() as f32;
    let variance = series.iter().map(|e| (e - mean).powi(2)).sum::<f32>() / series.len() as f32;
    variance > 1e-9
}

/// Detect BPM via energy-windowed autocorrelation (§4.7). Defaults to 120
/// on constant-amplitude or silent input, where no lag is distinguishable
/// from any other.
#[must_use]
pub fn detect_bpm(mono: &[f32], sample_rate: u32) -> u32 {
    if mono.is_empty() {
        return DEFAULT_BPM;
    }
    let window_samples = ((sample_rate as f32) * ENERGY_WINDOW_SECONDS).round().max(1.0);
    let series = energy_series(mono, sample_rate);
    if !has_clear_peak(&series) {
        return DEFAULT_BPM;
    }

    let mut best_bpm = DEFAULT_BPM;
    let mut best_score = f32::MIN;
    for bpm in BPM_MIN..=BPM_MAX {
        let samples_per_beat = (sample_rate as f32) * 60.0 / bpm as f32;
        let lag = (samples_per_beat / window_samples).round() as usize;
        let score = autocorrelation(&series, lag);
        if score > best_score {
            best_score = score;
            best_bpm = bpm;
        }
    }
    best_bpm
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn silent_input_defaults_to_120() {
        let mono = vec![0.0_f32; 44100 * 2];
        assert_eq!(detect_bpm(&mono, 44100), 120);
    }

    #[test]
    fn constant_amplitude_defaults_to_120() {
        let mono = vec![0.5_f32; 44100 * 2];
        assert_eq!(detect_bpm(&mono, 44100), 120);
    }

    #[test]
    fn periodic_click_track_is_within_range() {
        let sample_rate = 44100u32;
        let bpm = 128.0_f32;
        let period_samples = (sample_rate as f32 * 60.0 / bpm) as usize;
        let mut mono = vec![0.0_f32; sample_rate as usize * 8];
        let mut i = 0;
        while i < mono.len() {
            for k in 0..200.min(mono.len() - i) {
                mono[i + k] = 1.0 - (k as f32 / 200.0);
            }
            i += period_samples;
        }
        let detected = detect_bpm(&mono, sample_rate);
        assert!((60..=180).contains(&detected));
    }
}
