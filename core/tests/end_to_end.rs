//! Integration tests for scenarios that span more than one module: the
//! conductor driving broadcasts at session start, and the directional
//! search's locality filter rejecting a candidate whose off-target shift
//! would move it in PCA space even though its raw feature distance looks
//! close.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use drift_core::conductor::{ConductorAction, ConductorInput, SessionConductor};
use drift_core::corpus::{Corpus, LoadedCorpus};
use drift_core::directional::directional_search;
use drift_types::{
    CalibrationTable, Event, FeatureIndex, FeatureVector, PcaProjection, PcaWeights, Resolution, SessionId,
    SessionType, Track, TrackId, TrackMetadataBlob,
};

fn track(id: &str, bpm: f32, centroid: f32) -> Track {
    let mut features = FeatureVector::zero();
    features[FeatureIndex::Bpm] = bpm;
    features[FeatureIndex::SpectralCentroid] = centroid;
    Track {
        id: TrackId::new(id),
        title: "t".into(),
        artist: "a".into(),
        album: "al".into(),
        album_cover_path: None,
        file_path: PathBuf::from("/x"),
        duration_seconds: 180.0,
        features,
        pca: PcaProjection { primary_d: bpm, tonal: [0.0; 3], spectral: [0.0; 3], rhythmic: [0.0; 3] },
        vae: None,
        metadata: TrackMetadataBlob::default(),
    }
}

fn sample_corpus() -> Corpus {
    let tracks: Vec<Track> = (0..8).map(|i| track(&format!("t{i}"), 100.0 + i as f32, 1000.0 + i as f32 * 10.0)).collect();
    Corpus::build(LoadedCorpus { tracks, pca_weights: PcaWeights::default(), calibration: CalibrationTable::default() })
}

/// Scenario 1 ("cold start, single listener"): subscribing and ticking a
/// freshly seeded session should produce exactly one heartbeat and exactly
/// one explorer snapshot, and neither should repeat on an immediately
/// following tick with nothing else changed.
#[test]
fn cold_start_emits_one_heartbeat_and_one_explorer_snapshot() {
    let corpus = sample_corpus();
    let mut conductor = SessionConductor::new(SessionId::new("s1"), SessionType::Anonymous, Resolution::MagnifyingGlass, 12, 15, 3);
    let start = Instant::now();
    conductor.seed(TrackId::new("t0"), start);

    conductor.handle(&corpus, ConductorInput::AudioSubscribe, start).unwrap();
    conductor.handle(&corpus, ConductorInput::EventSubscribe, start).unwrap();

    let tick_at = start + Duration::from_millis(50);
    let first = conductor.handle(&corpus, ConductorInput::Tick, tick_at).unwrap();
    let heartbeats = first.iter().filter(|a| matches!(a, ConductorAction::Broadcast(Event::Heartbeat(_)))).count();
    let snapshots = first.iter().filter(|a| matches!(a, ConductorAction::Broadcast(Event::ExplorerSnapshot(_)))).count();
    assert_eq!(heartbeats, 1, "expected exactly one heartbeat on the first tick");
    assert_eq!(snapshots, 1, "expected exactly one explorer snapshot on the first tick");

    // Same instant again: nothing about the session's visible state changed,
    // so both broadcasts should be suppressed this time.
    let second = conductor.handle(&corpus, ConductorInput::Tick, tick_at).unwrap();
    assert!(
        !second.iter().any(|a| matches!(a, ConductorAction::Broadcast(Event::Heartbeat(_)))),
        "unchanged heartbeat content should be deduped on the next tick"
    );
    assert!(
        !second.iter().any(|a| matches!(a, ConductorAction::Broadcast(Event::ExplorerSnapshot(_)))),
        "explorer snapshot should not repeat while the current track and resolution are unchanged"
    );
}

/// Scenario 3 ("debounce coalescing"): three rapid `UserSelect`s within the
/// debounce window resolve to a single `selection_ack` for the last one.
#[test]
fn debounce_coalescing_acks_only_the_last_selection() {
    let corpus = sample_corpus();
    let mut conductor = SessionConductor::new(SessionId::new("s1"), SessionType::Anonymous, Resolution::MagnifyingGlass, 12, 15, 3);
    let start = Instant::now();
    conductor.seed(TrackId::new("t0"), start);

    for (offset_ms, target) in [(0, "t1"), (500, "t2"), (1000, "t3")] {
        conductor
            .handle(
                &corpus,
                ConductorInput::UserSelect { track_id: TrackId::new(target), direction: None, debounce_ms: 2000 },
                start + Duration::from_millis(offset_ms),
            )
            .unwrap();
    }

    let before_debounce = conductor.handle(&corpus, ConductorInput::Tick, start + Duration::from_millis(1500)).unwrap();
    assert!(!before_debounce.iter().any(|a| matches!(a, ConductorAction::Broadcast(Event::SelectionAck { .. }))));

    let after_debounce = conductor.handle(&corpus, ConductorInput::Tick, start + Duration::from_millis(3200)).unwrap();
    let acks: Vec<&TrackId> = after_debounce
        .iter()
        .filter_map(|a| match a {
            ConductorAction::Broadcast(Event::SelectionAck { track_id }) => Some(track_id),
            _ => None,
        })
        .collect();
    assert_eq!(acks, vec![&TrackId::new("t3")], "only the last selection within the debounce window should be acked");
    assert!(
        after_debounce.iter().any(|a| matches!(a, ConductorAction::PrepareNext { track_id, .. } if *track_id == TrackId::new("t3"))),
        "preparation should target the last selection"
    );
}

/// Scenario 6 ("locality-filter correctness"): a candidate whose raw bpm
/// delta alone would pass the feature-space neighborhood search is still
/// rejected if shifting a second dimension to its value moves the isolated
/// PCA projection outside the inner radius; a candidate that differs from
/// the current track only in the target dimension is accepted.
mod locality_filter {
    use super::*;

    fn weights_tying_primary_d_to_spectral_centroid() -> PcaWeights {
        let mut weights = PcaWeights::default();
        weights.components.insert("primary_d".to_string(), [("spectral_centroid".to_string(), 1.0)].into_iter().collect());
        weights
    }

    fn current() -> Track {
        let mut t = track("current", 100.0, 2000.0);
        t.pca.primary_d = 2000.0; // consistent with the weights above: 1.0 * spectral_centroid
        t
    }

    #[test]
    fn candidate_with_large_off_target_shift_is_rejected() {
        let mut candidate = track("candidate", 102.0, 2100.0); // bpm +2, spectral_centroid +100
        candidate.pca.primary_d = 2002.0;

        let loaded = LoadedCorpus { tracks: vec![candidate], pca_weights: weights_tying_primary_d_to_spectral_centroid(), calibration: CalibrationTable::default() };
        let corpus = Corpus::build(loaded);

        let result = directional_search(&corpus, &current(), "faster", Resolution::MagnifyingGlass).unwrap();
        assert_eq!(result.candidates.len(), 0, "a candidate whose off-target counterfactual leaves the inner radius must be rejected");
    }

    #[test]
    fn candidate_with_bpm_only_shift_is_accepted() {
        let mut candidate = track("candidate", 102.0, 2000.0); // bpm +2 only, every other raw feature matches current
        candidate.pca.primary_d = 2002.0;

        let loaded = LoadedCorpus { tracks: vec![candidate], pca_weights: weights_tying_primary_d_to_spectral_centroid(), calibration: CalibrationTable::default() };
        let corpus = Corpus::build(loaded);

        let result = directional_search(&corpus, &current(), "faster", Resolution::MagnifyingGlass).unwrap();
        assert_eq!(result.candidates.len(), 1, "a candidate differing only in the target dimension must pass the locality filter");
        assert_eq!(result.candidates[0].delta, 2.0);
    }
}
