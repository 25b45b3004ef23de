//! Thin, in-process operator CLI (§6): no RPC client, no running daemon
//! required. Each subcommand loads a corpus directly and drives the engine
//! in-process, the way a one-shot diagnostic tool should.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use drift_core::conductor::{ConductorInput, SessionConductor};
use drift_core::corpus::{Corpus, CorpusLoader, JsonCorpusLoader};
use drift_core::explorer::build_explorer_data;
use drift_core::sinks::EventSink;
use drift_core::test_support::RecordingEventSink;
use drift_types::{Resolution, SessionId, SessionType};

#[derive(Parser)]
#[command(name = "drift-cli", version = env!("CARGO_PKG_VERSION"), about)]
struct Flags {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a corpus catalog and report its track count and any warnings.
    Validate {
        #[clap(long, value_hint = clap::ValueHint::FilePath)]
        corpus: PathBuf,
    },
    /// Print the full explorer snapshot for one track as JSON.
    Directions {
        #[clap(long, value_hint = clap::ValueHint::FilePath)]
        corpus: PathBuf,
        #[clap(long)]
        track: String,
        #[clap(long, default_value = "magnifying_glass")]
        resolution: String,
        #[clap(long, default_value_t = 12)]
        max_dimensions: usize,
    },
    /// Run a session in-process against the noise codec and print the
    /// events it broadcasts, one JSON object per line.
    Simulate {
        #[clap(long, value_hint = clap::ValueHint::FilePath)]
        corpus: PathBuf,
        #[clap(long, default_value_t = 10)]
        ticks: u32,
        #[clap(long, default_value_t = 40)]
        tick_interval_ms: u64,
    },
}

fn resolution_from_str(s: &str) -> Resolution {
    match s {
        "microscope" => Resolution::Microscope,
        "binoculars" => Resolution::Binoculars,
        _ => Resolution::MagnifyingGlass,
    }
}

fn load(path: &PathBuf) -> anyhow::Result<Corpus> {
    let loaded = JsonCorpusLoader::new(path).load()?;
    Ok(Corpus::build(loaded))
}

fn main() -> anyhow::Result<()> {
    let flags = Flags::parse();
    match flags.command {
        Command::Validate { corpus } => validate(&corpus),
        Command::Directions { corpus, track, resolution, max_dimensions } => {
            directions(&corpus, &track, &resolution, max_dimensions)
        }
        Command::Simulate { corpus, ticks, tick_interval_ms } => simulate(&corpus, ticks, tick_interval_ms),
    }
}

fn validate(path: &PathBuf) -> anyhow::Result<()> {
    let corpus = load(path)?;
    println!("tracks: {}", corpus.len());
    if corpus.is_empty() {
        println!("warning: corpus has no tracks");
    }
    for track in corpus.tracks() {
        if track.duration_seconds <= 0.0 {
            println!("warning: track {} has a non-positive duration", track.id);
        }
    }
    Ok(())
}

fn directions(path: &PathBuf, track_id: &str, resolution: &str, max_dimensions: usize) -> anyhow::Result<()> {
    let corpus = load(path)?;
    let track_id = drift_types::TrackId::new(track_id);
    let track = corpus.get(&track_id)?.clone();
    let resolution = resolution_from_str(resolution);
    let excluded = std::iter::once(track_id.clone()).collect();
    let data = build_explorer_data(&corpus, &track, resolution, &excluded, max_dimensions, 15, 3)?;
    println!("{}", serde_json::to_string_pretty(&data.directions)?);
    Ok(())
}

fn simulate(path: &PathBuf, ticks: u32, tick_interval_ms: u64) -> anyhow::Result<()> {
    let corpus = load(path)?;
    let Some(seed_track) = corpus.tracks().first().map(|track| track.id.clone()) else {
        anyhow::bail!("corpus is empty; cannot simulate");
    };

    let session_id = SessionId::new("simulate");
    let mut conductor =
        SessionConductor::new(session_id.clone(), SessionType::Anonymous, Resolution::MagnifyingGlass, 12, 15, 3);
    conductor.seed(seed_track, Instant::now());

    let sink = RecordingEventSink::new();

    conductor.handle(&corpus, ConductorInput::AudioSubscribe, Instant::now())?;
    conductor.handle(&corpus, ConductorInput::EventSubscribe, Instant::now())?;

    let step = std::time::Duration::from_millis(tick_interval_ms);
    let mut now = Instant::now();
    for _ in 0..ticks {
        now += step;
        let actions = conductor.handle(&corpus, ConductorInput::Tick, now)?;
        for action in actions {
            if let drift_core::conductor::ConductorAction::Broadcast(event) = action {
                sink.broadcast(&session_id, event);
            }
        }
    }

    for event in sink.events_for(&session_id) {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_from_str_defaults_to_magnifying_glass() {
        assert_eq!(resolution_from_str("nonsense"), Resolution::MagnifyingGlass);
        assert_eq!(resolution_from_str("microscope"), Resolution::Microscope);
    }
}
