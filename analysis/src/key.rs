use rustfft::FftPlanner;
use rustfft::num_complex::Complex32;

const PITCH_CLASSES: [&str; 12] =
    ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

// Krumhansl-Schmuckler key profiles.
const MAJOR_PROFILE: [f32; 12] =
    [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];
const MINOR_PROFILE: [f32; 12] =
    [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

const FFT_SIZE: usize = 4096;
const A4_FREQ: f32 = 440.0;

fn chromagram(mono: &[f32], sample_rate: u32) -> Option<[f32; 12]> {
    if mono.len() < FFT_SIZE {
        return None;
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);

    let mut chroma = [0.0_f32; 12];
    let mut frames = 0usize;
    for window in mono.chunks(FFT_SIZE) {
        if window.len() < FFT_SIZE {
            break;
        }
        let mut buffer: Vec<Complex32> = window.iter().map(|s| Complex32::new(*s, 0.0)).collect();
        fft.process(&mut buffer);

        for (bin, value) in buffer.iter().enumerate().take(FFT_SIZE / 2).skip(1) {
            let freq = bin as f32 * sample_rate as f32 / FFT_SIZE as f32;
            if freq < 20.0 || freq > 5000.0 {
                continue;
            }
            let magnitude = value.norm();
            let semitones_from_a4 = 12.0 * (freq / A4_FREQ).log2();
            let pitch_class = (semitones_from_a4.round() as i32).rem_euclid(12) as usize;
            chroma[pitch_class] += magnitude;
        }
        frames += 1;
    }

    if frames == 0 {
        return None;
    }
    let total: f32 = chroma.iter().sum();
    if total <= 0.0 {
        return None;
    }
    for value in &mut chroma {
        *value /= total;
    }
    Some(chroma)
}

fn correlation(chroma: &[f32; 12], profile: &[f32; 12], rotation: usize) -> f32 {
    let mean_chroma = chroma.iter().sum::<f32>() / 12.0;
    let mean_profile = profile.iter().sum::<f32>() / 12.0;
    let mut numerator = 0.0_f32;
    let mut chroma_variance = 0.0_f32;
    let mut profile_variance = 0.0_f32;
    for i in 0..12 {
        let c = chroma[i] - mean_chroma;
        let p = profile[(i + rotation) % 12] - mean_profile;
        numerator += c * p;
        chroma_variance += c * c;
        profile_variance += p * p;
    }
    let denom = (chroma_variance * profile_variance).sqrt();
    if denom <= 0.0 { 0.0 } else { numerator / denom }
}

/// Best-effort key detection via chromagram correlation against the
/// Krumhansl-Schmuckler major/minor profiles. Returns `None` ("unknown")
/// rather than guessing when there isn't enough signal to build a
/// chromagram — pitch smoothing in the mixer must skip cleanly in that
/// case (§9 open question).
#[must_use]
pub fn detect_key(mono: &[f32], sample_rate: u32) -> Option<String> {
    let chroma = chromagram(mono, sample_rate)?;

    let mut best_label = None;
    let mut best_score = f32::MIN;
    for rotation in 0..12 {
        let major_score = correlation(&chroma, &MAJOR_PROFILE, rotation);
        if major_score > best_score {
            best_score = major_score;
            best_label = Some(format!("{} major", PITCH_CLASSES[rotation]));
        }
        let minor_score = correlation(&chroma, &MINOR_PROFILE, rotation);
        if minor_score > best_score {
            best_score = minor_score;
            best_label = Some(format!("{} minor", PITCH_CLASSES[rotation]));
        }
    }
    best_label
}

/// Shortest signed distance on the circle of fifths between two key
/// tokens' tonic pitch classes, clipped to `[-6, 6]`. Returns `None` if
/// either key is unknown.
#[must_use]
pub fn circle_of_fifths_distance(a: &str, b: &str) -> Option<i32> {
    let tonic = |key: &str| -> Option<i32> {
        let name = key.split(' ').next()?;
        PITCH_CLASSES.iter().position(|p| *p == name).map(|i| i as i32)
    };
    let ta = tonic(a)?;
    let tb = tonic(b)?;
    let raw = (tb - ta).rem_euclid(12);
    Some(if raw > 6 { raw - 12 } else { raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_buffer_has_unknown_key() {
        assert_eq!(detect_key(&[0.0; 100], 44100), None);
    }

    #[test]
    fn silent_buffer_has_unknown_key() {
        assert_eq!(detect_key(&[0.0; FFT_SIZE * 2], 44100), None);
    }

    #[test]
    fn fifths_distance_is_symmetric_and_bounded() {
        let d = circle_of_fifths_distance("C major", "F# major").unwrap();
        assert!((-6..=6).contains(&d));
    }

    #[test]
    fn unknown_key_has_no_distance() {
        assert_eq!(circle_of_fifths_distance("C major", "not a key"), None);
    }
}
