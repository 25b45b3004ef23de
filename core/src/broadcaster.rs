//! Event Broadcaster (§4.8/§4.5 "Broadcasts"): fans heartbeat and explorer
//! snapshot events out to a session's subscribers via an [`EventSink`], and
//! caches the last snapshot so a late joiner gets state on connect instead
//! of waiting for the next natural transition.

use std::collections::HashMap;
use std::sync::RwLock;

use drift_types::{Event, SessionId};

use crate::sinks::EventSink;

/// Per-session last-broadcast cache plus the fan-out call. Dedup against
/// repeat broadcasts is the [`crate::conductor::SessionConductor`]'s job
/// (it decides whether an event is worth sending at all); this type's job
/// is purely "send it, and remember it for whoever connects next."
pub struct EventBroadcaster<S: EventSink> {
    sink: S,
    last_snapshot: RwLock<HashMap<SessionId, Event>>,
}

impl<S: EventSink> EventBroadcaster<S> {
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self { sink, last_snapshot: RwLock::new(HashMap::new()) }
    }

    /// Send `event` to `session_id`'s subscribers, caching it if it is an
    /// explorer snapshot (§4.5: "emitted when the current track changes...
    /// cached; late subscribers receive the cached copy on connect").
    pub fn broadcast(&self, session_id: &SessionId, event: Event) {
        if matches!(event, Event::ExplorerSnapshot(_)) {
            let mut cache = self.last_snapshot.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            cache.insert(session_id.clone(), event.clone());
        }
        self.sink.broadcast(session_id, event);
    }

    /// Replay the cached snapshot to a newly connected subscriber, if one
    /// exists for this session.
    pub fn replay_last_snapshot(&self, session_id: &SessionId) {
        let cached = {
            let cache = self.last_snapshot.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            cache.get(session_id).cloned()
        };
        if let Some(event) = cached {
            self.sink.broadcast(session_id, event);
        }
    }

    pub fn forget_session(&self, session_id: &SessionId) {
        let mut cache = self.last_snapshot.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.remove(session_id);
    }
}
