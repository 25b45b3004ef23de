//! Fingerprint Registry (§4.9): a process-wide map correlating a
//! per-session fingerprint token with the client IPs that have touched it,
//! used to join an SSE metadata stream and an audio stream from the same
//! listener over separate connections.

use std::collections::HashMap;
use std::sync::RwLock;

use drift_types::{Fingerprint, SessionId, TrackId};

/// Generate a 6-hex-digit nonce the way a fixed-width ID suffix is
/// typically minted: from a fast, non-cryptographic RNG, since this token
/// only needs to disambiguate same-track-same-instant collisions, not
/// resist an adversary.
fn nonce_hex6() -> String {
    use rand::Rng;
    let value: u32 = rand::thread_rng().gen_range(0..0x1_000_000);
    format!("{value:06x}")
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    session_id: SessionId,
    track_id: TrackId,
    start_time_unix_ms: u64,
    stream_ip: Option<String>,
    metadata_ip: Option<String>,
    last_touch_unix_ms: u64,
}

/// Process-wide fingerprint table (§4.9). Shared via `Arc` across session
/// tasks the way `Corpus` is; internally synchronized since registration
/// and lookups arrive from independent connections.
#[derive(Default)]
pub struct FingerprintRegistry {
    by_fingerprint: RwLock<HashMap<Fingerprint, RegistryEntry>>,
    by_session: RwLock<HashMap<SessionId, Fingerprint>>,
}

impl FingerprintRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint and register a fresh fingerprint for `session_id`, replacing any
    /// prior fingerprint that session held.
    pub fn register(&self, session_id: &SessionId, track_id: &TrackId, start_time_unix_ms: u64) -> Fingerprint {
        let fingerprint = Fingerprint::mint(track_id, start_time_unix_ms, &nonce_hex6());

        let mut by_session = self.by_session.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut by_fingerprint = self.by_fingerprint.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(old) = by_session.insert(session_id.clone(), fingerprint.clone()) {
            by_fingerprint.remove(&old);
        }
        by_fingerprint.insert(
            fingerprint.clone(),
            RegistryEntry {
                session_id: session_id.clone(),
                track_id: track_id.clone(),
                start_time_unix_ms,
                stream_ip: None,
                metadata_ip: None,
                last_touch_unix_ms: start_time_unix_ms,
            },
        );
        fingerprint
    }

    /// Record observed client IPs and bump the last-touch timestamp.
    pub fn touch(&self, fingerprint: &Fingerprint, stream_ip: Option<String>, metadata_ip: Option<String>, now_unix_ms: u64) {
        let mut by_fingerprint = self.by_fingerprint.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(entry) = by_fingerprint.get_mut(fingerprint) {
            if stream_ip.is_some() {
                entry.stream_ip = stream_ip;
            }
            if metadata_ip.is_some() {
                entry.metadata_ip = metadata_ip;
            }
            entry.last_touch_unix_ms = now_unix_ms;
        }
    }

    #[must_use]
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<(SessionId, TrackId, Option<String>, Option<String>)> {
        let by_fingerprint = self.by_fingerprint.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        by_fingerprint
            .get(fingerprint)
            .map(|entry| (entry.session_id.clone(), entry.track_id.clone(), entry.stream_ip.clone(), entry.metadata_ip.clone()))
    }

    pub fn remove_by_session(&self, session_id: &SessionId) {
        let mut by_session = self.by_session.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(fingerprint) = by_session.remove(session_id) {
            let mut by_fingerprint = self.by_fingerprint.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            by_fingerprint.remove(&fingerprint);
        }
    }

    /// Drop entries whose last touch is older than `ttl_ms` relative to `now_unix_ms`.
    pub fn prune_stale(&self, ttl_ms: u64, now_unix_ms: u64) {
        let mut by_fingerprint = self.by_fingerprint.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut by_session = self.by_session.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let stale: Vec<Fingerprint> = by_fingerprint
            .iter()
            .filter(|(_, entry)| now_unix_ms.saturating_sub(entry.last_touch_unix_ms) > ttl_ms)
            .map(|(fingerprint, _)| fingerprint.clone())
            .collect();
        for fingerprint in stale {
            if let Some(entry) = by_fingerprint.remove(&fingerprint) {
                by_session.remove(&entry.session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn registering_twice_replaces_the_prior_fingerprint() {
        let registry = FingerprintRegistry::new();
        let session = SessionId::new("s1");
        let first = registry.register(&session, &TrackId::new("a"), 1000);
        let second = registry.register(&session, &TrackId::new("b"), 2000);
        assert!(registry.lookup(&first).is_none());
        assert!(registry.lookup(&second).is_some());
    }

    #[test]
    fn touch_records_ips() {
        let registry = FingerprintRegistry::new();
        let session = SessionId::new("s1");
        let fingerprint = registry.register(&session, &TrackId::new("a"), 1000);
        registry.touch(&fingerprint, Some("1.2.3.4".into()), None, 1500);
        let (_, _, stream_ip, _) = registry.lookup(&fingerprint).unwrap();
        assert_eq!(stream_ip.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn prune_stale_drops_old_entries() {
        let registry = FingerprintRegistry::new();
        let session = SessionId::new("s1");
        let fingerprint = registry.register(&session, &TrackId::new("a"), 1000);
        registry.prune_stale(500, 5000);
        assert!(registry.lookup(&fingerprint).is_none());
    }

    #[test]
    fn remove_by_session_clears_both_directions() {
        let registry = FingerprintRegistry::new();
        let session = SessionId::new("s1");
        let fingerprint = registry.register(&session, &TrackId::new("a"), 1000);
        registry.remove_by_session(&session);
        assert!(registry.lookup(&fingerprint).is_none());
    }
}
