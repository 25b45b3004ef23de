use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::calibration::Resolution;
use crate::direction::Direction;
use crate::track::TrackId;

/// Opaque per-listener session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Arc<str>);

impl SessionId {
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Anonymous,
    Named,
    Playlist,
}

/// One entry in a session's journey stack: the track visited, the
/// direction that produced it (absent for the seed track), and the
/// resolution active at the time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyStackEntry {
    pub track_id: TrackId,
    pub direction: Option<Direction>,
    pub resolution: Resolution,
}

/// Per-session fingerprint token: `trackId@startTime@nonce6hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub Arc<str>);

impl Fingerprint {
    #[must_use]
    pub fn mint(track_id: &TrackId, start_time_unix_ms: u64, nonce_hex6: &str) -> Self {
        Self(format!("{track_id}@{start_time_unix_ms}@{nonce_hex6}").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fingerprint_mint_has_three_at_separated_parts() {
        let id = TrackId::new("abc");
        let fp = Fingerprint::mint(&id, 1000, "ab12cd");
        assert_eq!(fp.0.split('@').count(), 3);
    }
}
