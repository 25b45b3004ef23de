use crate::pcm::Pcm;

/// Scan forward/backward for the first/last frame whose normalized
/// amplitude exceeds `threshold` on any channel, and return the trimmed
/// byte buffer plus its new duration in seconds. Idempotent: trimming an
/// already-trimmed buffer at the same threshold returns it unchanged.
#[must_use]
pub fn trim_silence(pcm: &Pcm, threshold: f32) -> (Vec<u8>, f32) {
    let channels = pcm.channels.max(1) as usize;
    let frame_count = pcm.frame_count();
    if frame_count == 0 {
        return (Vec::new(), 0.0);
    }

    let samples: Vec<i16> = pcm.samples().collect();
    let frame_exceeds = |frame: usize| -> bool {
        (0..channels).any(|ch| {
            let idx = frame * channels + ch;
            (f32::from(samples[idx]) / 32768.0).abs() > threshold
        })
    };

    let first = (0..frame_count).find(|&f| frame_exceeds(f));
    let Some(first) = first else {
        return (Vec::new(), 0.0);
    };
    let last = (0..frame_count).rev().find(|&f| frame_exceeds(f)).unwrap_or(first);

    let start_byte = first * channels * 2;
    let end_byte = (last + 1) * channels * 2;
    let trimmed = pcm.bytes[start_byte..end_byte].to_vec();
    let new_frames = last - first + 1;
    let duration = new_frames as f32 / pcm.sample_rate as f32;
    (trimmed, duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stereo_bytes(frames: &[(i16, i16)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (l, r) in frames {
            out.extend_from_slice(&l.to_le_bytes());
            out.extend_from_slice(&r.to_le_bytes());
        }
        out
    }

    #[test]
    fn all_silent_trims_to_nothing() {
        let bytes = stereo_bytes(&[(0, 0); 10]);
        let pcm = Pcm::new(&bytes, 1000, 2).unwrap();
        let (trimmed, duration) = trim_silence(&pcm, 0.01);
        assert_eq!(trimmed, Vec::<u8>::new());
        assert_eq!(duration, 0.0);
    }

    #[test]
    fn trim_is_idempotent() {
        let mut frames = vec![(0, 0); 3];
        frames.extend(vec![(20000, 20000); 4]);
        frames.extend(vec![(0, 0); 3]);
        let bytes = stereo_bytes(&frames);
        let pcm = Pcm::new(&bytes, 1000, 2).unwrap();
        let (trimmed_once, _) = trim_silence(&pcm, 0.1);

        let pcm2 = Pcm::new(&trimmed_once, 1000, 2).unwrap();
        let (trimmed_twice, _) = trim_silence(&pcm2, 0.1);

        assert_eq!(trimmed_once, trimmed_twice);
    }

    #[test]
    fn trims_leading_and_trailing_silence_only() {
        let mut frames = vec![(0, 0); 2];
        frames.extend(vec![(20000, 20000); 3]);
        frames.extend(vec![(0, 0); 2]);
        let bytes = stereo_bytes(&frames);
        let pcm = Pcm::new(&bytes, 1000, 2).unwrap();
        let (trimmed, duration) = trim_silence(&pcm, 0.1);
        assert_eq!(trimmed.len(), 3 * 2 * 2);
        assert_eq!(duration, 0.003);
    }
}
