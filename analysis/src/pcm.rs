use crate::errors::AnalysisError;

/// Interleaved 16-bit stereo PCM, the format every analysis routine in this
/// crate consumes (§4.7: "operates on 16-bit stereo little-endian PCM at a
/// fixed sample rate").
pub struct Pcm<'a> {
    pub bytes: &'a [u8],
    pub sample_rate: u32,
    pub channels: u16,
}

impl<'a> Pcm<'a> {
    pub fn new(bytes: &'a [u8], sample_rate: u32, channels: u16) -> Result<Self, AnalysisError> {
        if bytes.is_empty() {
            return Err(AnalysisError::EmptySamples);
        }
        if bytes.len() % 2 != 0 {
            return Err(AnalysisError::MisalignedBuffer(bytes.len()));
        }
        Ok(Self { bytes, sample_rate, channels })
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        let samples = self.bytes.len() / 2;
        samples / self.channels.max(1) as usize
    }

    /// Iterate raw `i16` samples (all channels, interleaved).
    pub fn samples(&self) -> impl Iterator<Item = i16> + 'a {
        self.bytes.chunks_exact(2).map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Extract a single channel (0-indexed) as normalized `f32` in `[-1, 1]`.
    #[must_use]
    pub fn channel(&self, channel: u16) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        self.samples()
            .skip(channel as usize)
            .step_by(channels)
            .map(|s| f32::from(s) / 32768.0)
            .collect()
    }

    /// Mono downmix: average of all channels per frame, normalized to
    /// `[-1, 1]`. Averaging is more robust than taking a single channel;
    /// `lead_time` opts out and reads the left channel directly where that
    /// matters.
    #[must_use]
    pub fn mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.channel(0);
        }
        let frames = self.frame_count();
        let mut out = Vec::with_capacity(frames);
        let all: Vec<i16> = self.samples().collect();
        for frame in 0..frames {
            let mut acc = 0.0_f32;
            for ch in 0..channels {
                acc += f32::from(all[frame * channels + ch]) / 32768.0;
            }
            out.push(acc / channels as f32);
        }
        out
    }
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
    fn empty_buffer_is_an_error() {
        assert_eq!(Pcm::new(&[], 44100, 2).unwrap_err(), AnalysisError::EmptySamples);
    }

    #[test]
    fn odd_length_buffer_is_misaligned() {
        assert_eq!(Pcm::new(&[0u8; 3], 44100, 2).unwrap_err(), AnalysisError::MisalignedBuffer(3));
    }

    #[test]
    fn frame_count_divides_by_channel_count() {
        let bytes = stereo_bytes(&[(0, 0), (1, 1), (2, 2)]);
        let pcm = Pcm::new(&bytes, 44100, 2).unwrap();
        assert_eq!(pcm.frame_count(), 3);
    }

    #[test]
    fn mono_averages_channels() {
        let bytes = stereo_bytes(&[(32767, -32768)]);
        let pcm = Pcm::new(&bytes, 44100, 2).unwrap();
        let mono = pcm.mono();
        assert_eq!(mono.len(), 1);
        assert!(mono[0].abs() < 0.01);
    }
}
