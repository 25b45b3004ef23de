/// Root-mean-square level across the whole (mono) buffer.
#[must_use]
pub fn rms(mono: &[f32]) -> f32 {
    if mono.is_empty() {
        return 0.0;
    }
    (mono.iter().map(|s| s * s).sum::<f32>() / mono.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_buffer_has_zero_rms() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn constant_amplitude_rms_equals_amplitude() {
        let mono = vec![0.5_f32; 1000];
        assert!((rms(&mono) - 0.5).abs() < 1e-6);
    }
}
