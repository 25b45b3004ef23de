use std::path::Path;

use crate::errors::CodecError;

/// The media codec boundary (§6): treated as an opaque, blocking
/// PCM-to-compressed byte-stream converter. A real implementation (MP3,
/// Opus, whatever the deployment picks) lives outside this crate; callers
/// invoke it through this trait so the engine never depends on a concrete
/// decoder.
///
/// Both operations are blocking and must be called from a worker thread
/// (`tokio::task::spawn_blocking` in `drift-core`), never from a session's
/// tick loop directly.
pub trait Codec: Send + Sync {
    /// Decode a media file to raw 16-bit signed little-endian interleaved
    /// PCM at the requested sample rate and channel count.
    fn decode(&self, file_path: &Path, sample_rate: u32, channels: u16) -> Result<Vec<u8>, CodecError>;

    /// Encode raw PCM to a compressed byte stream (e.g. MP3) at the given
    /// bitrate.
    fn encode(&self, pcm: &[u8], sample_rate: u32, channels: u16, bitrate_kbps: u32) -> Result<Vec<u8>, CodecError>;
}
