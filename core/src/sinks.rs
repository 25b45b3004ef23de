//! External collaborator boundaries (§6): the HTTP/SSE transport is out of
//! scope for this crate, so the mixer and broadcaster only depend on these
//! two traits, mirroring the way `drift_analysis::Codec` keeps the media
//! decoder out of the engine.

use drift_types::{Event, SessionId};

/// Fans a typed event out to a session's event subscribers. A concrete
/// implementation lives in the daemon (SSE, websocket, whatever the
/// deployment picks).
pub trait EventSink: Send + Sync {
    fn broadcast(&self, session_id: &SessionId, event: Event);
}

/// Accepts compressed audio chunks for a session's audio subscribers.
pub trait AudioSink: Send + Sync {
    /// Returns `false` if the sink could not accept the chunk (e.g. every
    /// subscriber disconnected mid-write).
    fn write(&self, session_id: &SessionId, chunk: &[u8]) -> bool;

    fn has_clients(&self, session_id: &SessionId) -> bool;
}
