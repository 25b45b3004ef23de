//! Test doubles (§6, §7 "Noise fallback"): a brown-noise `Codec` used both
//! by this crate's own tests and as the daemon/CLI's bundled low-volume
//! fallback source, plus in-memory `EventSink`/`AudioSink` recorders for
//! driving a session end to end without a real transport.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rand::Rng;

use drift_analysis::{Codec, CodecError};
use drift_types::{Event, SessionId};

use crate::sinks::{AudioSink, EventSink};

/// A `Codec` that never touches the filesystem: "decode" synthesizes one
/// second of brown noise (a random walk of small increments, clamped to
/// `[-1, 1]`, the way a one-pole lowpass over white noise behaves), and
/// "encode" is the identity — there is no real container format to produce.
/// Used for the rate-limited noise fallback (§7) and wherever a test needs
/// a `Codec` without decoding a real file.
#[derive(Default)]
pub struct NoiseCodec;

impl Codec for NoiseCodec {
    fn decode(&self, _file_path: &Path, sample_rate: u32, channels: u16) -> Result<Vec<u8>, CodecError> {
        let frames = sample_rate as usize;
        let channels = channels.max(1) as usize;
        let mut rng = rand::thread_rng();
        let mut bytes = Vec::with_capacity(frames * channels * 2);
        let mut level = 0.0_f32;
        for _ in 0..frames {
            let step: f32 = rng.gen_range(-0.02..0.02);
            level = (level + step).clamp(-1.0, 1.0);
            let sample = (level * 0.1 * f32::from(i16::MAX)) as i16;
            for _ in 0..channels {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
        }
        Ok(bytes)
    }

    fn encode(&self, pcm: &[u8], _sample_rate: u32, _channels: u16, _bitrate_kbps: u32) -> Result<Vec<u8>, CodecError> {
        Ok(pcm.to_vec())
    }
}

/// An in-memory [`EventSink`] recording every broadcast event per session,
/// for assertions in tests that drive a [`crate::conductor::SessionConductor`]
/// end to end.
#[derive(Default)]
pub struct RecordingEventSink {
    sent: Mutex<HashMap<SessionId, Vec<Event>>>,
}

impl RecordingEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events_for(&self, session_id: &SessionId) -> Vec<Event> {
        self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(session_id).cloned().unwrap_or_default()
    }
}

impl EventSink for RecordingEventSink {
    fn broadcast(&self, session_id: &SessionId, event: Event) {
        self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).entry(session_id.clone()).or_default().push(event);
    }
}

/// An in-memory [`AudioSink`]: every session starts with no clients until
/// [`InMemoryAudioSink::connect`] is called, matching how a real subscriber
/// connection would gate `has_clients`.
#[derive(Default)]
pub struct InMemoryAudioSink {
    chunks: Mutex<HashMap<SessionId, Vec<Vec<u8>>>>,
    connected: Mutex<std::collections::HashSet<SessionId>>,
}

impl InMemoryAudioSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, session_id: &SessionId) {
        self.connected.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(session_id.clone());
    }

    pub fn disconnect(&self, session_id: &SessionId) {
        self.connected.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(session_id);
    }

    #[must_use]
    pub fn chunk_count(&self, session_id: &SessionId) -> usize {
        self.chunks.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(session_id).map_or(0, Vec::len)
    }
}

impl AudioSink for InMemoryAudioSink {
    fn write(&self, session_id: &SessionId, chunk: &[u8]) -> bool {
        if !self.has_clients(session_id) {
            return false;
        }
        self.chunks.lock().unwrap_or_else(std::sync::PoisonError::into_inner).entry(session_id.clone()).or_default().push(chunk.to_vec());
        true
    }

    fn has_clients(&self, session_id: &SessionId) -> bool {
        self.connected.lock().unwrap_or_else(std::sync::PoisonError::into_inner).contains(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn noise_codec_produces_the_requested_duration() {
        let codec = NoiseCodec;
        let pcm = codec.decode(Path::new("/dev/null"), 8000, 1).unwrap();
        assert_eq!(pcm.len(), 8000 * 2);
    }

    #[test]
    fn noise_codec_encode_is_identity() {
        let codec = NoiseCodec;
        let pcm = vec![1, 2, 3, 4];
        assert_eq!(codec.encode(&pcm, 44100, 2, 192).unwrap(), pcm);
    }

    #[test]
    fn audio_sink_rejects_writes_before_connect() {
        let sink = InMemoryAudioSink::new();
        let session = SessionId::new("s1");
        assert!(!sink.write(&session, b"x"));
        sink.connect(&session);
        assert!(sink.write(&session, b"x"));
        assert_eq!(sink.chunk_count(&session), 1);
    }

    #[test]
    fn event_sink_records_per_session() {
        use drift_types::event::HeartbeatPayload;
        let sink = RecordingEventSink::new();
        let session = SessionId::new("s1");
        sink.broadcast(
            &session,
            Event::Heartbeat(HeartbeatPayload {
                current_track: None,
                elapsed_ms: 0,
                remaining_ms: 0,
                next_track: None,
                override_pending: false,
                drift_active: false,
                audio_subscriber_count: 0,
                event_subscriber_count: 0,
                fingerprint: None,
            }),
        );
        assert_eq!(sink.events_for(&session).len(), 1);
    }
}
