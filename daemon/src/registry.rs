//! Named-session persistence (§6 "Persisted state"): an in-memory registry
//! keyed by name, with no on-disk format — persisted history beyond this
//! registry is explicitly out of scope.

use std::collections::HashMap;
use std::sync::Mutex;

use drift_types::{JourneyStackEntry, Resolution, SessionType};

#[derive(Debug, Clone)]
pub struct PersistedSession {
    pub session_type: SessionType,
    pub name: String,
    pub stack: Vec<JourneyStackEntry>,
    pub stack_index: usize,
    pub resolution: Resolution,
    pub ephemeral: bool,
    pub updated_at_unix_ms: u64,
}

/// Process-wide registry of named sessions (§9: "design as explicit
/// singletons with clear init/teardown and a single point of serialization
/// for mutation").
#[derive(Default)]
pub struct NamedSessionRegistry {
    sessions: Mutex<HashMap<String, PersistedSession>>,
}

impl NamedSessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, session: PersistedSession) {
        let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if session.ephemeral {
            return;
        }
        sessions.insert(session.name.clone(), session);
    }

    #[must_use]
    pub fn load(&self, name: &str) -> Option<PersistedSession> {
        let sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions.get(name).cloned()
    }

    pub fn remove(&self, name: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions.remove(name);
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions.keys().cloned().collect()
    }
}
