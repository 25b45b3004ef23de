//! The `drift-daemon` binary: the only thing it does is load settings, wire
//! up a session, and wait for a shutdown signal — everything interesting
//! lives in the library crate, which is tested.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use drift_core::broadcaster::EventBroadcaster;
use drift_core::conductor::SessionConductor;
use drift_core::config::Settings;
use drift_core::fingerprint::FingerprintRegistry;
use drift_core::logger::init_logger;
use drift_core::test_support::NoiseCodec;
use drift_daemon::sinks::{FileAudioSink, LoggingEventSink};
use drift_daemon::{load_corpus, spawn_session};
use drift_daemon::termination::create_termination;
use drift_types::{SessionId, SessionType};

/// Options configurable via the CLI.
#[derive(Parser)]
#[command(name = "drift-daemon", version = env!("CARGO_PKG_VERSION"), about)]
struct Flags {
    /// Use this config file instead of the one in the default location.
    #[clap(long, short, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,
    /// Override `daemon.corpus_path` from the config file.
    #[clap(long, value_hint = clap::ValueHint::FilePath)]
    corpus: Option<PathBuf>,
    /// Directory audio chunks are written to, one file per session.
    #[clap(long, default_value = "./drift-audio", value_hint = clap::ValueHint::DirPath)]
    audio_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let flags = Flags::try_parse()?;

    let config_file = match &flags.config {
        Some(path) if path.exists() => path.clone(),
        Some(_) => anyhow::bail!("config file does not exist at the given path"),
        None => Settings::get_config_path()?,
    };

    let mut settings = Settings::init(&config_file)?;
    if let Some(corpus) = flags.corpus {
        settings.daemon.corpus_path = Some(corpus);
    }

    init_logger(settings.daemon.log_level);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(settings, flags.audio_dir))
}

async fn run(settings: Settings, audio_dir: PathBuf) -> anyhow::Result<()> {
    let corpus = Arc::new(load_corpus(&settings)?);
    log::info!("loaded corpus with {} tracks", corpus.len());

    let Some(seed_track) = corpus.tracks().first().map(|track| track.id.clone()) else {
        anyhow::bail!("corpus is empty; cannot seed a session");
    };

    let codec = Arc::new(NoiseCodec);
    let broadcaster = Arc::new(EventBroadcaster::new(LoggingEventSink));
    let audio_sink = Arc::new(FileAudioSink::new(audio_dir));
    let fingerprints = Arc::new(FingerprintRegistry::new());

    let session_id = SessionId::new("default");
    audio_sink.open(&session_id)?;

    let mut conductor = SessionConductor::new(
        session_id.clone(),
        SessionType::Anonymous,
        settings.engine.default_resolution,
        settings.engine.max_dimensions,
        settings.engine.stack_total,
        settings.engine.stack_random,
    );
    conductor.seed(seed_track, Instant::now());

    let (_handle, join) =
        spawn_session(session_id, corpus, codec, broadcaster, audio_sink, fingerprints, conductor, &settings.engine);

    let (_terminator, mut interrupts) = create_termination();
    tokio::select! {
        reason = interrupts.wait() => {
            log::info!("received shutdown signal: {reason:?}");
        }
        result = join => {
            if let Err(err) = result {
                log::error!("session actor task panicked: {err}");
            }
        }
    }

    println!("exiting");
    Ok(())
}
