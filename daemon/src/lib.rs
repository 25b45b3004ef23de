//! Process wiring for the drift radio engine (§5 "Concurrency & Resource
//! Model"): session actors, the named-session registry, and reference
//! `EventSink`/`AudioSink` implementations. The HTTP/SSE transport itself is
//! out of scope; this crate proves the engine runs continuously end to end
//! using the file/log-backed sinks in [`sinks::FileAudioSink`] /
//! [`sinks::LoggingEventSink`].

pub mod actor;
pub mod registry;
pub mod sinks;
pub mod termination;

use drift_core::config::Settings;
use drift_core::corpus::{Corpus, CorpusLoader, JsonCorpusLoader};

pub use actor::{spawn_session, SessionHandle};
pub use registry::{NamedSessionRegistry, PersistedSession};

/// Load the corpus named by `settings.daemon.corpus_path`.
///
/// # Errors
///
/// Returns an error if no corpus path is configured or the catalog file
/// could not be read/parsed.
pub fn load_corpus(settings: &Settings) -> anyhow::Result<Corpus> {
    let Some(path) = &settings.daemon.corpus_path else {
        anyhow::bail!("no corpus_path configured; set daemon.corpus_path in Drift.toml");
    };
    let loaded = JsonCorpusLoader::new(path).load()?;
    Ok(Corpus::build(loaded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_corpus_fails_loudly_without_a_configured_path() {
        let settings = Settings::default();
        assert!(load_corpus(&settings).is_err());
    }
}
