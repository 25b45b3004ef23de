//! Reference implementations of `drift_core::sinks::{EventSink, AudioSink}`.
//! HTTP/SSE transport is out of scope here, so these exist to prove the
//! engine runs end to end: events go to the log, audio chunks go to a
//! per-session file. A real deployment swaps these for its own wire
//! protocol without touching `drift-core`.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use drift_core::sinks::{AudioSink, EventSink};
use drift_types::{Event, SessionId};

pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn broadcast(&self, session_id: &SessionId, event: Event) {
        match serde_json::to_string(&event) {
            Ok(json) => log::debug!("[{session_id}] {json}"),
            Err(err) => log::warn!("[{session_id}] failed to serialize event for logging: {err}"),
        }
    }
}

/// Writes each session's audio chunks to `{dir}/{session_id}.chunks`,
/// appending. Has no notion of a real "connected client"; a session is
/// considered to have clients once [`FileAudioSink::open`] has been called
/// for it and before [`FileAudioSink::close`].
pub struct FileAudioSink {
    dir: PathBuf,
    files: Mutex<HashMap<SessionId, File>>,
}

impl FileAudioSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), files: Mutex::new(HashMap::new()) }
    }

    /// # Errors
    ///
    /// Returns an error if the output directory or file could not be created.
    pub fn open(&self, session_id: &SessionId) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{session_id}.chunks"));
        let file = File::create(path)?;
        self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(session_id.clone(), file);
        Ok(())
    }

    pub fn close(&self, session_id: &SessionId) {
        self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(session_id);
    }
}

impl AudioSink for FileAudioSink {
    fn write(&self, session_id: &SessionId, chunk: &[u8]) -> bool {
        let mut files = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(file) = files.get_mut(session_id) else { return false };
        file.write_all(chunk).is_ok()
    }

    fn has_clients(&self, session_id: &SessionId) -> bool {
        self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner).contains_key(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_fails_without_an_open_file() {
        let sink = FileAudioSink::new(std::env::temp_dir().join("drift-sink-test-unopened"));
        let session = SessionId::new("s1");
        assert!(!sink.has_clients(&session));
        assert!(!sink.write(&session, b"chunk"));
    }

    #[test]
    fn open_then_write_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileAudioSink::new(dir.path());
        let session = SessionId::new("s1");
        sink.open(&session).unwrap();
        assert!(sink.has_clients(&session));
        assert!(sink.write(&session, b"chunk"));
        sink.close(&session);
        assert!(!sink.has_clients(&session));
    }
}
