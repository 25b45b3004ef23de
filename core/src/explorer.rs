//! Explorer Aggregator (§4.4): produces the full `ExplorerData` object for a
//! session's current track and resolution — the enumerated, budgeted,
//! deduplicated set of directions a listener can drift toward next.

use std::collections::HashSet;

use drift_types::{
    Direction, DirectionEntry, FeatureIndex, PcaDiscriminator, PcaDomain, Polarity, Resolution, Track, TrackBrief,
    TrackId,
};
use rand::seq::SliceRandom;

use crate::corpus::Corpus;
use crate::directional::{self, FALLBACK_RADIUS};
use crate::diversity::{diversity_score, options_bonus};
use crate::errors::EngineError;
use crate::kdtree::euclidean;

/// The 12 raw features budgeted as "core" original-feature directions
/// (§4.4 step 6). The remaining 6 raw features are still searchable via
/// §4.3 directly but do not compete for explorer budget slots.
pub const CORE_FEATURES: [FeatureIndex; 12] = [
    FeatureIndex::Bpm,
    FeatureIndex::Danceability,
    FeatureIndex::OnsetRate,
    FeatureIndex::BeatPunch,
    FeatureIndex::TonalClarity,
    FeatureIndex::Crest,
    FeatureIndex::Entropy,
    FeatureIndex::SpectralCentroid,
    FeatureIndex::SpectralRolloff,
    FeatureIndex::SpectralEnergy,
    FeatureIndex::SubDrive,
    FeatureIndex::AirSizzle,
];

const MAX_CANDIDATES_PER_DIRECTION: usize = 40;
const TOTAL_NEIGHBORHOOD_LIMIT: usize = 1000;

/// Full exploration data for one `(current_track_id, resolution)` pair.
/// Memoized by the session conductor using that key (§4.4 final line).
#[derive(Debug, Clone)]
pub struct ExplorerData {
    pub current_track_id: TrackId,
    pub resolution: Resolution,
    pub directions: Vec<DirectionEntry>,
    pub next_track: Option<TrackBrief>,
}

/// One direction's filtered candidate pool, pre-budget.
struct RawDirection {
    direction: Direction,
    key: String,
    label: String,
    description: String,
    domain: &'static str,
    /// Ranked track indices, most-similar-on-other-axes first.
    candidates: Vec<usize>,
}

pub(crate) fn total_neighborhood(corpus: &Corpus, current: &Track, resolution: Resolution) -> Result<Vec<usize>, EngineError> {
    let (inner, outer) = corpus
        .calibration_entry(resolution, PcaDiscriminator::PrimaryD)
        .map_or((0.0, FALLBACK_RADIUS), |entry| (0.0, entry.outer_radius * entry.scaling_factor));
    let hits = corpus.tree().pca_radius_search(
        corpus.tracks(),
        current,
        PcaDiscriminator::PrimaryD,
        inner,
        outer,
        outer * 2.0,
        TOTAL_NEIGHBORHOOD_LIMIT,
    )?;
    Ok(hits.into_iter().map(|hit| hit.track_index).collect())
}

fn original_feature_direction(
    corpus: &Corpus,
    current: &Track,
    dimension: FeatureIndex,
    polarity: Polarity,
    resolution: Resolution,
    excluded: &HashSet<TrackId>,
) -> Result<Option<RawDirection>, EngineError> {
    let result = directional::search_dimension(corpus, current, dimension, polarity, resolution)?;
    let candidates: Vec<usize> = result
        .candidates
        .into_iter()
        .map(|c| c.track_index)
        .filter(|&index| !excluded.contains(&corpus.tracks()[index].id))
        .take(MAX_CANDIDATES_PER_DIRECTION)
        .collect();
    let direction = Direction::Feature { feature_index: dimension as usize, polarity };
    Ok(Some(RawDirection {
        key: direction.to_key(feature_name_by_index),
        label: format!("{} {}", dimension.name().replace('_', " "), polarity.suffix()),
        description: format!("Tracks with {} {} than the current track", dimension.name().replace('_', " "), polarity_word(polarity)),
        domain: "original",
        direction,
        candidates,
    }))
}

fn feature_name_by_index(index: usize) -> &'static str {
    use strum::IntoEnumIterator;
    FeatureIndex::iter().nth(index).map_or("unknown", FeatureIndex::name)
}

fn polarity_word(polarity: Polarity) -> &'static str {
    match polarity {
        Polarity::Positive => "higher",
        Polarity::Negative => "lower",
    }
}

fn pca_direction(
    corpus: &Corpus,
    current: &Track,
    neighborhood: &[usize],
    domain: PcaDomain,
    component_index: usize,
    polarity: Polarity,
    excluded: &HashSet<TrackId>,
) -> RawDirection {
    let current_domain = current.pca.domain(domain).unwrap_or([0.0; 3]);
    let mut scored: Vec<(usize, f32)> = neighborhood
        .iter()
        .copied()
        .filter(|&index| !excluded.contains(&corpus.tracks()[index].id))
        .filter_map(|index| {
            let candidate = &corpus.tracks()[index];
            let candidate_domain = candidate.pca.domain(domain).unwrap_or([0.0; 3]);
            let delta = candidate_domain[component_index] - current_domain[component_index];
            let sign_ok = match polarity {
                Polarity::Positive => delta > 0.0,
                Polarity::Negative => delta < 0.0,
            };
            if !sign_ok || delta == 0.0 {
                return None;
            }
            let other_indices: Vec<usize> = (0..3).filter(|&i| i != component_index).collect();
            let current_other: Vec<f32> = other_indices.iter().map(|&i| current_domain[i]).collect();
            let candidate_other: Vec<f32> = other_indices.iter().map(|&i| candidate_domain[i]).collect();
            let rank_distance = euclidean(&current_other, &candidate_other);
            Some((index, rank_distance))
        })
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MAX_CANDIDATES_PER_DIRECTION);

    let direction = Direction::Pca { domain, component_index, polarity };
    RawDirection {
        key: direction.to_key(|_| ""),
        label: format!("{} pc{} {}", domain.name(), component_index + 1, polarity.suffix()),
        description: format!(
            "Tracks with {} {} along the {} axis",
            polarity_word(polarity),
            component_index + 1,
            domain.name()
        ),
        domain: domain.name(),
        direction,
        candidates: scored.into_iter().map(|(index, _)| index).collect(),
    }
}

fn vae_direction(
    corpus: &Corpus,
    current: &Track,
    neighborhood: &[usize],
    axis_index: usize,
    polarity: Polarity,
    excluded: &HashSet<TrackId>,
) -> Option<RawDirection> {
    let current_latent = current.vae.as_ref()?.values;
    let mut scored: Vec<(usize, f32)> = neighborhood
        .iter()
        .copied()
        .filter(|&index| !excluded.contains(&corpus.tracks()[index].id))
        .filter_map(|index| {
            let candidate = &corpus.tracks()[index];
            let candidate_latent = candidate.vae.as_ref()?.values;
            let delta = candidate_latent[axis_index] - current_latent[axis_index];
            let sign_ok = match polarity {
                Polarity::Positive => delta > 0.0,
                Polarity::Negative => delta < 0.0,
            };
            if !sign_ok || delta == 0.0 {
                return None;
            }
            let other: Vec<usize> = (0..8).filter(|&i| i != axis_index).collect();
            let current_other: Vec<f32> = other.iter().map(|&i| current_latent[i]).collect();
            let candidate_other: Vec<f32> = other.iter().map(|&i| candidate_latent[i]).collect();
            let rank_distance = euclidean(&current_other, &candidate_other);
            Some((index, rank_distance))
        })
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MAX_CANDIDATES_PER_DIRECTION);

    let direction = Direction::Vae { axis_index, polarity };
    Some(RawDirection {
        key: direction.to_key(|_| ""),
        label: format!("latent {} {}", axis_index, polarity.suffix()),
        description: format!("Tracks differing along learned latent axis {axis_index}"),
        domain: "vae",
        direction,
        candidates: scored.into_iter().map(|(index, _)| index).collect(),
    })
}

/// Build the full `ExplorerData` for `current` at `resolution`, excluding
/// `excluded` (the current track plus session-played tracks) from every
/// candidate pool, and budgeting to `max_dimensions` slots (§4.4 steps 1-12).
///
/// # Errors
///
/// Returns an engine error if the underlying KD-tree is not initialized.
#[allow(clippy::too_many_lines)]
pub fn build_explorer_data(
    corpus: &Corpus,
    current: &Track,
    resolution: Resolution,
    excluded: &HashSet<TrackId>,
    max_dimensions: usize,
    stack_total: usize,
    stack_random: usize,
) -> Result<ExplorerData, EngineError> {
    let neighborhood = total_neighborhood(corpus, current, resolution)?;
    let total = neighborhood.len();

    // Step 2: PCA directions, 3 domains × 3 components × 2 polarities.
    let mut pca_raw = Vec::new();
    for domain in [PcaDomain::Tonal, PcaDomain::Spectral, PcaDomain::Rhythmic] {
        for component in 0..3 {
            for polarity in [Polarity::Positive, Polarity::Negative] {
                pca_raw.push(pca_direction(corpus, current, &neighborhood, domain, component, polarity, excluded));
            }
        }
    }

    // Step 3: the 12 budgeted "core" raw features × 2 polarities.
    let mut core_raw = Vec::new();
    for dimension in CORE_FEATURES {
        for polarity in [Polarity::Positive, Polarity::Negative] {
            if let Some(raw) = original_feature_direction(corpus, current, dimension, polarity, resolution, excluded)? {
                core_raw.push(raw);
            }
        }
    }

    // Step 4: VAE directions, one pair per latent axis, if present.
    let mut vae_raw = Vec::new();
    if current.vae.is_some() {
        for axis in 0..8 {
            for polarity in [Polarity::Positive, Polarity::Negative] {
                if let Some(raw) = vae_direction(corpus, current, &neighborhood, axis, polarity, excluded) {
                    vae_raw.push(raw);
                }
            }
        }
    }

    // Step 5: reject empty or near-total directions.
    let reject = |raw: &RawDirection| raw.candidates.is_empty() || (total >= 10 && raw.candidates.len() > total - 10);
    pca_raw.retain(|r| !reject(r));
    core_raw.retain(|r| !reject(r));
    vae_raw.retain(|r| !reject(r));

    // Step 6: budget. VAE first, then split remaining slots between core
    // and PCA, richest (by candidate count) first within each category.
    core_raw.sort_by(|a, b| b.candidates.len().cmp(&a.candidates.len()));
    pca_raw.sort_by(|a, b| b.candidates.len().cmp(&a.candidates.len()));

    let mut budgeted = Vec::new();
    let mut remaining = max_dimensions;
    for raw in vae_raw {
        if remaining == 0 {
            break;
        }
        budgeted.push(raw);
        remaining -= 1;
    }
    let mut core_iter = core_raw.into_iter();
    let mut pca_iter = pca_raw.into_iter();
    while remaining > 0 {
        let mut progressed = false;
        if let Some(raw) = core_iter.next() {
            budgeted.push(raw);
            remaining -= 1;
            progressed = true;
        }
        if remaining == 0 {
            break;
        }
        if let Some(raw) = pca_iter.next() {
            budgeted.push(raw);
            remaining -= 1;
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    // Step 7: dedup across stacks. Richer (larger) directions claim tracks
    // first; a track already claimed is removed from every later direction.
    budgeted.sort_by(|a, b| b.candidates.len().cmp(&a.candidates.len()));
    let mut claimed: HashSet<TrackId> = HashSet::new();
    for raw in &mut budgeted {
        raw.candidates.retain(|&index| claimed.insert(corpus.tracks()[index].id.clone()));
    }
    budgeted.retain(|r| !r.candidates.is_empty());

    // Step 8: stack budget — total slots, last `stack_random` shuffled from
    // the unused pool (there is none here since candidates were already
    // truncated to 40 and deduped; the deterministic top `stack_total -
    // stack_random` come first, the remainder is shuffled in place to seed
    // the "random tail" without pulling in cross-direction duplicates).
    let mut rng = rand::thread_rng();
    for raw in &mut budgeted {
        if raw.candidates.len() > stack_total {
            let (_head, tail) = raw.candidates.split_at_mut(stack_total.saturating_sub(stack_random));
            tail.shuffle(&mut rng);
            raw.candidates.truncate(stack_total);
        }
    }

    // Step 9: bidirectional pairing.
    let mut entries: Vec<DirectionEntry> = Vec::new();
    let mut consumed = vec![false; budgeted.len()];
    for i in 0..budgeted.len() {
        if consumed[i] {
            continue;
        }
        let pair_index = (i + 1..budgeted.len()).find(|&j| !consumed[j] && is_opposite(&budgeted[i].direction, &budgeted[j].direction));
        let entry = match pair_index {
            Some(j) => {
                consumed[j] = true;
                let (primary, opposite) = match budgeted[i].candidates.len().cmp(&budgeted[j].candidates.len()) {
                    std::cmp::Ordering::Less => (j, i),
                    std::cmp::Ordering::Greater => (i, j),
                    std::cmp::Ordering::Equal => {
                        if budgeted[i].direction.polarity() == Polarity::Positive { (i, j) } else { (j, i) }
                    }
                };
                let opposite_entry = to_entry(corpus, &budgeted[opposite], total, None);
                to_entry(corpus, &budgeted[primary], total, Some(Box::new(opposite_entry)))
            }
            None => to_entry(corpus, &budgeted[i], total, None),
        };
        consumed[i] = true;
        entries.push(entry);
    }

    // Step 10: prefer unique album covers for each stack's top track.
    prefer_unique_covers(&mut entries);

    // Step 12: nominate next track.
    let next_track = nominate_next(&entries, excluded);

    Ok(ExplorerData { current_track_id: current.id.clone(), resolution, directions: entries, next_track })
}

fn same_axis(a: &Direction, b: &Direction) -> bool {
    match (a, b) {
        (Direction::Feature { feature_index: fa, .. }, Direction::Feature { feature_index: fb, .. }) => fa == fb,
        (
            Direction::Pca { domain: da, component_index: ca, .. },
            Direction::Pca { domain: db, component_index: cb, .. },
        ) => da == db && ca == cb,
        (Direction::Vae { axis_index: aa, .. }, Direction::Vae { axis_index: ab, .. }) => aa == ab,
        _ => false,
    }
}

fn is_opposite(a: &Direction, b: &Direction) -> bool {
    same_axis(a, b) && a.polarity() != b.polarity()
}

fn to_entry(corpus: &Corpus, raw: &RawDirection, total: usize, opposite: Option<Box<DirectionEntry>>) -> DirectionEntry {
    let track_count = raw.candidates.len();
    let split_ratio = DirectionEntry::split_ratio_of(track_count, total);
    DirectionEntry {
        key: raw.key.clone(),
        label: raw.label.clone(),
        description: raw.description.clone(),
        domain: raw.domain,
        direction: raw.direction,
        track_count,
        total_neighborhood_size: total,
        diversity_score: diversity_score(split_ratio),
        split_ratio,
        is_outlier: track_count < 3,
        sample_tracks: raw.candidates.iter().map(|&index| TrackBrief::from(&corpus.tracks()[index])).collect(),
        opposite_direction: opposite,
    }
}

fn prefer_unique_covers(entries: &mut [DirectionEntry]) {
    let mut used_covers: HashSet<std::path::PathBuf> = HashSet::new();
    for entry in entries.iter_mut() {
        if entry.sample_tracks.is_empty() {
            continue;
        }
        let top_is_stale = match &entry.sample_tracks[0].album_cover_path {
            Some(cover) => used_covers.contains(cover),
            None => entry.sample_tracks.iter().any(|t| t.album_cover_path.is_some()),
        };
        if top_is_stale
            && let Some(position) = entry
                .sample_tracks
                .iter()
                .position(|t| t.album_cover_path.as_ref().is_some_and(|c| !used_covers.contains(c)))
        {
            entry.sample_tracks.swap(0, position);
        }
        if let Some(cover) = &entry.sample_tracks[0].album_cover_path {
            used_covers.insert(cover.clone());
        }
    }
}

/// Nominate a next track (§4.4 step 12): from the direction with the
/// highest adjusted diversity weight, pick the first candidate not already
/// played; if none qualify, fall back to that direction's top candidate.
fn nominate_next(entries: &[DirectionEntry], excluded: &HashSet<TrackId>) -> Option<TrackBrief> {
    let best_entry = entries.iter().max_by(|a, b| {
        let weight_a = if a.domain == "original" { 1.5 } else { 1.0 };
        let weight_b = if b.domain == "original" { 1.5 } else { 1.0 };
        let score_a = a.diversity_score * options_bonus(a.track_count) * weight_a;
        let score_b = b.diversity_score * options_bonus(b.track_count) * weight_b;
        score_a.partial_cmp(&score_b).unwrap_or(std::cmp::Ordering::Equal)
    })?;
    best_entry
        .sample_tracks
        .iter()
        .find(|t| !excluded.contains(&t.id))
        .or_else(|| best_entry.sample_tracks.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_types::{CalibrationTable, FeatureVector, PcaProjection, PcaWeights, TrackMetadataBlob};
    use std::path::PathBuf;

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
        let tracks: Vec<Track> = (0..20).map(|i| track(&format!("t{i}"), 100.0 + i as f32, 1000.0 + i as f32 * 10.0)).collect();
        Corpus::build(crate::corpus::LoadedCorpus { tracks, pca_weights: PcaWeights::default(), calibration: CalibrationTable::default() })
    }

    #[test]
    fn small_neighborhood_still_yields_a_next_track() {
        let corpus = sample_corpus();
        let current = corpus.tracks()[0].clone();
        let excluded = HashSet::new();
        let data = build_explorer_data(&corpus, &current, Resolution::MagnifyingGlass, &excluded, 12, 15, 3).unwrap();
        assert!(data.next_track.is_some() || data.directions.is_empty());
    }

    #[test]
    fn every_track_appears_in_at_most_one_direction() {
        let corpus = sample_corpus();
        let current = corpus.tracks()[0].clone();
        let excluded = HashSet::new();
        let data = build_explorer_data(&corpus, &current, Resolution::MagnifyingGlass, &excluded, 12, 15, 3).unwrap();
        let mut seen = HashSet::new();
        for entry in &data.directions {
            for track in &entry.sample_tracks {
                assert!(seen.insert(track.id.clone()), "track {:?} appeared in more than one direction", track.id);
            }
            if let Some(opposite) = &entry.opposite_direction {
                for track in &opposite.sample_tracks {
                    assert!(seen.insert(track.id.clone()), "track {:?} appeared in more than one direction", track.id);
                }
            }
        }
    }

    #[test]
    fn excluded_tracks_never_appear() {
        let corpus = sample_corpus();
        let current = corpus.tracks()[0].clone();
        let mut excluded = HashSet::new();
        excluded.insert(TrackId::new("t1"));
        let data = build_explorer_data(&corpus, &current, Resolution::MagnifyingGlass, &excluded, 12, 15, 3).unwrap();
        for entry in &data.directions {
            assert!(entry.sample_tracks.iter().all(|t| t.id != TrackId::new("t1")));
        }
    }
}
