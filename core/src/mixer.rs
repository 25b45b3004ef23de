//! Streaming Mixer (§4.6): a per-session, single-threaded state machine
//! over two buffer slots (`current`, `next`) that ticks at a fixed cadence,
//! emits compressed audio chunks, and performs a beat-matched cosine
//! crossfade. Pure state transitions live here; the actual write to an
//! [`crate::sinks::AudioSink`] is the daemon's job, kept separate from the
//! command loop that drives it.

use std::sync::Arc;
use std::time::Instant;

use drift_types::TrackId;

/// Fixed crossfade duration (§4.6: "Duration fixed (e.g., 2.5 s)").
pub const DEFAULT_CROSSFADE_DURATION_SECONDS: f32 = 2.5;
/// Tempo-matching tolerance (§4.6: "17% tolerance").
pub const DEFAULT_TEMPO_TOLERANCE: f32 = 0.17;
/// Per-tick easing rate for gradual tempo adjustment.
const TEMPO_STEP_RATE: f32 = 0.1;
const TEMPO_SNAP_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone)]
pub struct MixerSlot {
    pub track_id: TrackId,
    pub encoded_buffer: Arc<[u8]>,
    pub bytes_emitted: usize,
    pub bpm: u32,
    pub key: Option<String>,
    pub duration_seconds: f32,
    pub lead_time_seconds: f32,
    pub playback_rate: f32,
    pub target_rate: f32,
    pub pitch_ratio: f32,
}

impl MixerSlot {
    #[must_use]
    pub fn new(track_id: TrackId, encoded_buffer: Arc<[u8]>, bpm: u32, key: Option<String>, duration_seconds: f32, lead_time_seconds: f32) -> Self {
        Self { track_id, encoded_buffer, bytes_emitted: 0, bpm, key, duration_seconds, lead_time_seconds, playback_rate: 1.0, target_rate: 1.0, pitch_ratio: 1.0 }
    }

    fn estimated_bitrate(&self) -> f32 {
        if self.duration_seconds > 0.0 {
            self.encoded_buffer.len() as f32 / self.duration_seconds
        } else {
            0.0
        }
    }

    fn bytes_remaining(&self) -> usize {
        self.encoded_buffer.len().saturating_sub(self.bytes_emitted)
    }

    /// §4.6 "chunk-resize tempo approximation": rather than resampling, a
    /// sped-up or pitch-shifted slot simply steps its byte cursor faster or
    /// slower than `chunk_size_bytes`, approximating the rate change.
    fn effective_rate(&self) -> f32 {
        self.playback_rate * self.pitch_ratio
    }

    fn take_chunk(&mut self, chunk_size_bytes: usize) -> Option<Vec<u8>> {
        if self.bytes_remaining() == 0 {
            return None;
        }
        let step = ((chunk_size_bytes as f32) * self.effective_rate()).round().max(1.0) as usize;
        let end = (self.bytes_emitted + step).min(self.encoded_buffer.len());
        let chunk = self.encoded_buffer[self.bytes_emitted..end].to_vec();
        self.bytes_emitted = end;
        Some(chunk)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MixerAction {
    EmitChunk { bytes: Vec<u8>, current_volume: f32, next_volume: f32 },
    CrossfadeStarted,
    CrossfadeCompleted,
    TrackEnded,
    TimingWarning { wall_clock_remaining_seconds: f32, byte_remaining_seconds: f32 },
}

pub struct StreamingMixer {
    current: Option<MixerSlot>,
    next: Option<MixerSlot>,
    track_start: Option<Instant>,
    crossfading: bool,
    crossfade_bytes_emitted: usize,
    crossfade_bytes_total: usize,
    crossfade_duration_seconds: f32,
    tempo_tolerance: f32,
    chunk_size_bytes: usize,
}

impl StreamingMixer {
    #[must_use]
    pub fn new(chunk_size_bytes: usize, crossfade_duration_seconds: f32, tempo_tolerance: f32) -> Self {
        Self {
            current: None,
            next: None,
            track_start: None,
            crossfading: false,
            crossfade_bytes_emitted: 0,
            crossfade_bytes_total: 0,
            crossfade_duration_seconds,
            tempo_tolerance,
            chunk_size_bytes,
        }
    }

    pub fn load_current(&mut self, slot: MixerSlot, now: Instant) {
        self.current = Some(slot);
        self.track_start = Some(now);
    }

    pub fn load_next(&mut self, slot: MixerSlot) {
        self.next = Some(slot);
    }

    #[must_use]
    pub fn current_track_id(&self) -> Option<&TrackId> {
        self.current.as_ref().map(|s| &s.track_id)
    }

    #[must_use]
    pub fn is_crossfading(&self) -> bool {
        self.crossfading
    }

    /// §4.6 "Tick (≈ 40 ms)".
    #[allow(clippy::too_many_lines)]
    pub fn tick(&mut self, now: Instant, has_audio_subscribers: bool) -> Vec<MixerAction> {
        let mut actions = Vec::new();
        if !has_audio_subscribers {
            return actions;
        }

        if let Some(current) = &mut self.current {
            if (current.target_rate - current.playback_rate).abs() < TEMPO_SNAP_EPSILON {
                current.playback_rate = current.target_rate;
            } else {
                current.playback_rate += TEMPO_STEP_RATE * (current.target_rate - current.playback_rate);
            }
        }

        let Some(elapsed) = self.track_start.map(|start| now.duration_since(start).as_secs_f32()) else {
            return actions;
        };
        let Some(current) = &self.current else { return actions };
        let duration_seconds = current.duration_seconds;
        let lead_time_seconds = current.lead_time_seconds;
        let remaining_wall = (duration_seconds - elapsed).max(0.0);
        let estimated_bitrate = current.estimated_bitrate();
        let effective_rate = current.effective_rate().max(f32::EPSILON);
        let remaining_bytes_seconds = if estimated_bitrate > 0.0 {
            current.bytes_remaining() as f32 / (estimated_bitrate * effective_rate)
        } else {
            remaining_wall
        };

        if !self.crossfading && self.next.is_some() && remaining_wall <= lead_time_seconds {
            self.start_crossfade();
            actions.push(MixerAction::CrossfadeStarted);
        }

        if (remaining_wall - remaining_bytes_seconds).abs() > self.crossfade_duration_seconds * 2.0 {
            log::warn!("mixer timing disagreement: wall clock {remaining_wall:.2}s vs byte-based {remaining_bytes_seconds:.2}s remaining");
            actions.push(MixerAction::TimingWarning { wall_clock_remaining_seconds: remaining_wall, byte_remaining_seconds: remaining_bytes_seconds });
        }

        if !self.crossfading && self.next.is_some() && remaining_bytes_seconds < 1.0 && remaining_wall > 1.0 {
            log::warn!("emergency crossfade: byte-based remaining {remaining_bytes_seconds:.2}s with {remaining_wall:.2}s of wall clock left");
            self.start_crossfade();
            actions.push(MixerAction::CrossfadeStarted);
        }

        if self.crossfading {
            if let Some(action) = self.emit_crossfade_chunk() {
                actions.push(action);
            }
            if self.crossfade_bytes_total > 0 && self.crossfade_bytes_emitted >= self.crossfade_bytes_total {
                self.complete_crossfade(now);
                actions.push(MixerAction::CrossfadeCompleted);
            }
        } else if let Some(chunk) = self.current.as_mut().and_then(|slot| slot.take_chunk(self.chunk_size_bytes)) {
            actions.push(MixerAction::EmitChunk { bytes: chunk, current_volume: 1.0, next_volume: 0.0 });
        }

        if elapsed >= duration_seconds && self.next.is_none() {
            actions.push(MixerAction::TrackEnded);
        }

        actions
    }

    /// §4.6 "On crossfade start": tempo matching and pitch smoothing.
    fn start_crossfade(&mut self) {
        let (Some(current), Some(next)) = (&self.current, &mut self.next) else { return };
        let rate = tempo_ratio(current.bpm, next.bpm, self.tempo_tolerance);
        next.target_rate = rate;

        let pitch = pitch_shift_semitones(current.key.as_deref(), next.key.as_deref()).map_or(1.0, pitch_ratio);
        if (pitch - 1.0).abs() > f32::EPSILON {
            next.pitch_ratio = pitch;
        }
        if rate != 1.0 || (pitch - 1.0).abs() > f32::EPSILON {
            let adjusted = adjusted_duration(next.duration_seconds, rate, pitch);
            if (adjusted - next.duration_seconds).abs() > 0.1 {
                next.duration_seconds = adjusted;
            }
        }

        self.crossfading = true;
        self.crossfade_bytes_emitted = 0;
        let bitrate = current.estimated_bitrate().max(1.0);
        self.crossfade_bytes_total = (self.crossfade_duration_seconds * bitrate).round() as usize;
    }

    fn emit_crossfade_chunk(&mut self) -> Option<MixerAction> {
        let progress = if self.crossfade_bytes_total > 0 { self.crossfade_bytes_emitted as f32 / self.crossfade_bytes_total as f32 } else { 1.0 };
        let (current_volume, next_volume) = crossfade_volumes(progress);
        self.crossfade_bytes_emitted += self.chunk_size_bytes;

        let source_is_current = current_volume >= next_volume;
        let chunk = if source_is_current {
            self.current.as_mut().and_then(|slot| slot.take_chunk(self.chunk_size_bytes))
        } else {
            self.next.as_mut().and_then(|slot| slot.take_chunk(self.chunk_size_bytes))
        }?;
        Some(MixerAction::EmitChunk { bytes: chunk, current_volume, next_volume })
    }

    /// §4.6 "Slot rotation": next becomes current, reset the clock.
    fn complete_crossfade(&mut self, now: Instant) {
        self.crossfading = false;
        self.crossfade_bytes_emitted = 0;
        self.crossfade_bytes_total = 0;
        if let Some(next) = self.next.take() {
            self.current = Some(next);
            self.track_start = Some(now);
        }
    }
}

/// §4.6 cosine crossfade envelope: `c = (1 − cos(πp))/2`, `current_volume =
/// cos(c·π/2)`, `next_volume = sin(c·π/2)`.
#[must_use]
pub fn crossfade_volumes(progress: f32) -> (f32, f32) {
    let p = progress.clamp(0.0, 1.0);
    let c = (1.0 - (std::f32::consts::PI * p).cos()) / 2.0;
    (((c * std::f32::consts::FRAC_PI_2).cos()), ((c * std::f32::consts::FRAC_PI_2).sin()))
}

/// §4.6 "Tempo matching": `next_bpm / current_bpm`; if within tolerance,
/// the next track is stretched to `current_bpm / next_bpm`, clamped.
#[must_use]
pub fn tempo_ratio(current_bpm: u32, next_bpm: u32, tolerance: f32) -> f32 {
    if current_bpm == 0 || next_bpm == 0 {
        return 1.0;
    }
    let ratio = f32::from(u16::try_from(next_bpm).unwrap_or(u16::MAX)) / f32::from(u16::try_from(current_bpm).unwrap_or(u16::MAX));
    if (1.0 - ratio).abs() <= tolerance {
        (current_bpm as f32 / next_bpm as f32).clamp(1.0 - tolerance, 1.0 + tolerance)
    } else {
        1.0
    }
}

/// §4.6 "Pitch smoothing": nearest compatible interval in `{0, ±3, ±7}`
/// when the raw circle-of-fifths distance is jarring (`{1, 2, 6}`).
#[must_use]
pub fn pitch_shift_semitones(current_key: Option<&str>, next_key: Option<&str>) -> Option<i32> {
    let distance = drift_analysis::key::circle_of_fifths_distance(current_key?, next_key?)?;
    if !matches!(distance.abs(), 1 | 2 | 6) {
        return None;
    }
    [0_i32, 3, -3, 7, -7].into_iter().min_by_key(|candidate| (distance - candidate).abs())
}

#[must_use]
pub fn pitch_ratio(shift_semitones: i32) -> f32 {
    2f32.powf(f32::from(i16::try_from(shift_semitones).unwrap_or(0)) / 12.0)
}

/// §4.6 "Recompute next-track duration as `original / tempo × pitch^0.1`".
#[must_use]
pub fn adjusted_duration(original_seconds: f32, tempo: f32, pitch: f32) -> f32 {
    original_seconds / tempo * pitch.powf(0.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn slot(id: &str, seconds: f32, bytes_per_second: usize, bpm: u32) -> MixerSlot {
        let buffer: Arc<[u8]> = Arc::from(vec![0u8; (seconds as usize) * bytes_per_second]);
        MixerSlot::new(TrackId::new(id), buffer, bpm, None, seconds, 2.0)
    }

    #[test]
    fn crossfade_volumes_are_complementary_at_the_midpoint() {
        let (current, next) = crossfade_volumes(0.5);
        assert!((current - next).abs() < 1e-3);
    }

    #[test]
    fn crossfade_volumes_start_and_end_at_the_extremes() {
        let (current, next) = crossfade_volumes(0.0);
        assert!(current > 0.99 && next < 0.01);
        let (current, next) = crossfade_volumes(1.0);
        assert!(current < 0.01 && next > 0.99);
    }

    #[test]
    fn tempo_ratio_is_identity_outside_tolerance() {
        assert_eq!(tempo_ratio(100, 200, 0.17), 1.0);
    }

    #[test]
    fn tempo_ratio_locks_within_tolerance() {
        let ratio = tempo_ratio(100, 110, 0.17);
        assert!((ratio - 100.0 / 110.0).abs() < 1e-6);
    }

    #[test]
    fn pitch_shift_is_none_for_a_compatible_interval() {
        assert_eq!(pitch_shift_semitones(Some("C major"), Some("G major")), None);
    }

    #[test]
    fn mixer_emits_a_normal_chunk_before_lead_time() {
        let mut mixer = StreamingMixer::new(4096, DEFAULT_CROSSFADE_DURATION_SECONDS, DEFAULT_TEMPO_TOLERANCE);
        let now = Instant::now();
        mixer.load_current(slot("a", 180.0, 1000, 120), now);
        let actions = mixer.tick(now + Duration::from_millis(40), true);
        assert!(actions.iter().any(|a| matches!(a, MixerAction::EmitChunk { .. })));
    }

    #[test]
    fn mixer_starts_crossfade_inside_lead_time() {
        let mut mixer = StreamingMixer::new(4096, DEFAULT_CROSSFADE_DURATION_SECONDS, DEFAULT_TEMPO_TOLERANCE);
        let now = Instant::now();
        mixer.load_current(slot("a", 10.0, 1000, 120), now);
        mixer.load_next(slot("b", 180.0, 1000, 120));
        let actions = mixer.tick(now + Duration::from_millis(9000), true);
        assert!(actions.contains(&MixerAction::CrossfadeStarted));
        assert!(mixer.is_crossfading());
    }

    #[test]
    fn suspended_without_subscribers() {
        let mut mixer = StreamingMixer::new(4096, DEFAULT_CROSSFADE_DURATION_SECONDS, DEFAULT_TEMPO_TOLERANCE);
        let now = Instant::now();
        mixer.load_current(slot("a", 180.0, 1000, 120), now);
        assert!(mixer.tick(now, false).is_empty());
    }
}
