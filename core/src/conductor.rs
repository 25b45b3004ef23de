//! Session Conductor (§4.5): per-listener mutable state, next-track
//! selection, the user-override protocol, the journey stack, and broadcast
//! dedup. Driven by an explicit input enum; the driver (the daemon) owns
//! the clock and the mixer, and the conductor only decides what should
//! happen next and reports it as a list of [`ConductorAction`]s.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use drift_types::{
    Direction, Event, ExplorerSnapshotPayload, Fingerprint, HeartbeatPayload, JourneyStackEntry, Resolution,
    SelectionFailedPayload, SelectionReadyPayload, SessionId, SessionType, Track, TrackBrief, TrackId,
};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::corpus::Corpus;
use crate::directional;
use crate::errors::EngineError;
use crate::explorer::{self, ExplorerData};

pub const MAX_HISTORY: usize = 50;
pub const DEFAULT_DEBOUNCE_MS: u64 = 5000;
pub const CROSSFADE_GUARD_SECONDS: f32 = 6.0;
pub const DEBOUNCE_RETRY_MS: u64 = 750;
pub const AUTO_RECOVERY_DELAY_MS: u64 = 200;
const FILTER_AFTER_HISTORY_LEN: usize = 3;

/// Explicit state-machine inputs the daemon feeds to a [`SessionConductor`].
#[derive(Debug, Clone)]
pub enum ConductorInput {
    Tick,
    AudioSubscribe,
    AudioUnsubscribe,
    EventSubscribe,
    EventUnsubscribe,
    UserSelect { track_id: TrackId, direction: Option<Direction>, debounce_ms: u64 },
    TrackLoaded { track_id: TrackId },
    TrackLoadFailed { track_id: TrackId, reason: String },
    CrossfadeStarted,
    CrossfadeCompleted,
    TrackEnded,
    ResolutionChanged { resolution: Resolution },
}

/// What the conductor asks its driver to do in response to an input. The
/// conductor never touches the mixer or the clock itself; the driver
/// executes these and reports outcomes back via further inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ConductorAction {
    PrepareNext { track_id: TrackId, reason: TransitionReason },
    ScheduleRetry { after_ms: u64 },
    ForceCutTransition,
    ScheduleAutoRecovery { after_ms: u64 },
    Broadcast(Event),
    /// §4.8 "`clear()`... is invoked on 'new neighborhood' transitions":
    /// a resolution change redefines the whole explorer neighborhood, so any
    /// mixdowns prepared under the old one are no longer relevant candidates.
    ClearMixdownCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    User,
    Explorer,
    DirectionalDrift,
}

#[derive(Debug, Clone)]
struct PendingOverride {
    track_id: TrackId,
    direction: Option<Direction>,
    generation: u64,
    requested_at: Instant,
    debounce: Duration,
}

/// Per-listener session state (§3 "Session State") plus the logic to drive
/// it. One instance per active session; created on first subscriber.
pub struct SessionConductor {
    pub session_id: SessionId,
    pub session_type: SessionType,
    pub name: Option<String>,
    pub resolution: Resolution,
    max_dimensions: usize,
    stack_total: usize,
    stack_random: usize,

    history: VecDeque<TrackId>,
    seen_tracks: HashSet<TrackId>,
    seen_artists: HashSet<String>,
    seen_albums: HashSet<String>,
    filter_artists: bool,
    filter_albums: bool,

    journey_stack: Vec<JourneyStackEntry>,
    stack_index: usize,
    ephemeral: bool,

    current_track: Option<TrackId>,
    pending_current: Option<TrackId>,
    next_track: Option<TrackId>,
    pending_direction: Option<Direction>,
    locked_next_id: Option<TrackId>,
    last_transition_reason: Option<TransitionReason>,

    manual_selection_generation: u64,
    pending_override: Option<PendingOverride>,

    explorer_cache: Option<ExplorerData>,
    explorer_snapshot_sent_for: Option<(TrackId, Resolution)>,
    current_fingerprint: Option<Fingerprint>,

    audio_subscribers: usize,
    event_subscribers: usize,

    track_start_time: Option<Instant>,
    crossfade_started_at: Option<Instant>,

    last_broadcast: HashMap<&'static str, String>,
}

impl SessionConductor {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        session_type: SessionType,
        resolution: Resolution,
        max_dimensions: usize,
        stack_total: usize,
        stack_random: usize,
    ) -> Self {
        Self {
            session_id,
            session_type,
            name: None,
            resolution,
            max_dimensions,
            stack_total,
            stack_random,
            history: VecDeque::new(),
            seen_tracks: HashSet::new(),
            seen_artists: HashSet::new(),
            seen_albums: HashSet::new(),
            filter_artists: false,
            filter_albums: false,
            journey_stack: Vec::new(),
            stack_index: 0,
            ephemeral: true,
            current_track: None,
            pending_current: None,
            next_track: None,
            pending_direction: None,
            locked_next_id: None,
            last_transition_reason: None,
            manual_selection_generation: 0,
            pending_override: None,
            explorer_cache: None,
            explorer_snapshot_sent_for: None,
            current_fingerprint: None,
            audio_subscribers: 0,
            event_subscribers: 0,
            track_start_time: None,
            crossfade_started_at: None,
            last_broadcast: HashMap::new(),
        }
    }

    /// Seed the session with its first track, without going through the
    /// transition machinery (there is no prior "current" to fade from).
    pub fn seed(&mut self, track_id: TrackId, now: Instant) {
        self.current_track = Some(track_id.clone());
        self.track_start_time = Some(now);
        self.push_history_id(track_id.clone());
        self.journey_stack.push(JourneyStackEntry { track_id, direction: None, resolution: self.resolution });
        self.stack_index = 0;
    }

    #[must_use]
    pub fn current_track_id(&self) -> Option<&TrackId> {
        self.current_track.as_ref()
    }

    /// §4.9: the registry that mints fingerprints is process-wide and keeps
    /// its own clock, so the conductor never mints one itself — the driver
    /// calls this once it has registered a fresh fingerprint for the track
    /// that just became current, and the next heartbeat reports it.
    pub fn set_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.current_fingerprint = Some(fingerprint);
    }

    #[must_use]
    pub fn journey_stack(&self) -> &[JourneyStackEntry] {
        &self.journey_stack
    }

    #[must_use]
    pub fn stack_index(&self) -> usize {
        self.stack_index
    }

    /// Jump to a prior position in the journey stack (§4.5 "Jumping to a
    /// stack index loads that track at the given position offset").
    pub fn jump_to_index(&mut self, index: usize) -> Option<&JourneyStackEntry> {
        if index >= self.journey_stack.len() {
            return None;
        }
        self.stack_index = index;
        self.journey_stack.get(index)
    }

    /// Advance the state machine by one input (§4.5). `now` is supplied by
    /// the driver so the conductor itself never reads the clock, keeping it
    /// deterministic and testable.
    ///
    /// # Errors
    ///
    /// Propagates [`EngineError`] from the underlying corpus/explorer calls.
    #[allow(clippy::too_many_lines)]
    pub fn handle(&mut self, corpus: &Corpus, input: ConductorInput, now: Instant) -> Result<Vec<ConductorAction>, EngineError> {
        match input {
            ConductorInput::AudioSubscribe => {
                self.audio_subscribers += 1;
                Ok(self.maybe_heartbeat(corpus, now).into_iter().collect())
            }
            ConductorInput::AudioUnsubscribe => {
                self.audio_subscribers = self.audio_subscribers.saturating_sub(1);
                Ok(self.maybe_heartbeat(corpus, now).into_iter().collect())
            }
            ConductorInput::EventSubscribe => {
                self.event_subscribers += 1;
                Ok(self.maybe_heartbeat(corpus, now).into_iter().collect())
            }
            ConductorInput::EventUnsubscribe => {
                self.event_subscribers = self.event_subscribers.saturating_sub(1);
                Ok(self.maybe_heartbeat(corpus, now).into_iter().collect())
            }
            ConductorInput::UserSelect { track_id, direction, debounce_ms } => {
                self.manual_selection_generation += 1;
                self.pending_override = Some(PendingOverride {
                    track_id,
                    direction,
                    generation: self.manual_selection_generation,
                    requested_at: now,
                    debounce: Duration::from_millis(debounce_ms),
                });
                self.next_track = None;
                self.locked_next_id = None;
                Ok(self.maybe_heartbeat(corpus, now).into_iter().collect())
            }
            ConductorInput::Tick => self.tick(corpus, now),
            ConductorInput::TrackLoaded { track_id } => Ok(self.track_loaded(track_id)),
            ConductorInput::TrackLoadFailed { track_id, reason } => Ok(self.track_load_failed(track_id, reason)),
            ConductorInput::CrossfadeStarted => {
                self.crossfade_started_at = Some(now);
                Ok(Vec::new())
            }
            ConductorInput::CrossfadeCompleted | ConductorInput::TrackEnded => {
                self.crossfade_started_at = None;
                self.complete_transition(corpus, now)
            }
            ConductorInput::ResolutionChanged { resolution } => {
                self.resolution = resolution;
                self.explorer_cache = None;
                self.explorer_snapshot_sent_for = None;
                Ok(vec![ConductorAction::ClearMixdownCache])
            }
        }
    }

    fn tick(&mut self, corpus: &Corpus, now: Instant) -> Result<Vec<ConductorAction>, EngineError> {
        let mut actions = Vec::new();
        if let Some(action) = self.maybe_heartbeat(corpus, now) {
            actions.push(action);
        }
        actions.extend(self.maybe_explorer_snapshot(corpus)?);

        if let Some(pending) = self.pending_override.clone() {
            if now.duration_since(pending.requested_at) >= pending.debounce {
                actions.extend(self.attempt_override(&pending, now));
            }
            return Ok(actions);
        }

        if self.next_track.is_none() {
            if let Some(current_id) = self.current_track.clone() {
                let current = corpus.get(&current_id)?;
                if let Some((track_id, reason, direction)) = self.select_next_from_candidates(corpus, current)? {
                    self.next_track = Some(track_id.clone());
                    self.pending_direction = direction;
                    self.last_transition_reason = Some(reason);
                    actions.push(ConductorAction::PrepareNext { track_id, reason });
                }
            }
        }
        Ok(actions)
    }

    /// §4.5 override protocol step 2: wait out an in-progress crossfade, or
    /// force a cut once it has run longer than the guard. Once the debounce
    /// has won — whether immediately or after forcing a cut — a `selection_ack`
    /// acknowledges the winning track before its preparation is even attempted.
    fn attempt_override(&mut self, pending: &PendingOverride, now: Instant) -> Vec<ConductorAction> {
        if let Some(started) = self.crossfade_started_at {
            let running = now.duration_since(started);
            let guard = Duration::from_secs_f32(CROSSFADE_GUARD_SECONDS);
            if running < guard {
                return vec![ConductorAction::ScheduleRetry { after_ms: DEBOUNCE_RETRY_MS }];
            }
            self.crossfade_started_at = None;
            self.next_track = Some(pending.track_id.clone());
            self.pending_direction = pending.direction;
            self.last_transition_reason = Some(TransitionReason::User);
            return vec![
                ConductorAction::Broadcast(Event::SelectionAck { track_id: pending.track_id.clone() }),
                ConductorAction::ForceCutTransition,
                ConductorAction::PrepareNext { track_id: pending.track_id.clone(), reason: TransitionReason::User },
            ];
        }
        self.next_track = Some(pending.track_id.clone());
        self.pending_direction = pending.direction;
        self.last_transition_reason = Some(TransitionReason::User);
        vec![
            ConductorAction::Broadcast(Event::SelectionAck { track_id: pending.track_id.clone() }),
            ConductorAction::PrepareNext { track_id: pending.track_id.clone(), reason: TransitionReason::User },
        ]
    }

    /// §4.5 override protocol step 3/4: a preload attempt resolved.
    fn track_loaded(&mut self, track_id: TrackId) -> Vec<ConductorAction> {
        self.pending_current = Some(track_id.clone());
        let Some(pending) = self.pending_override.clone() else { return Vec::new() };
        if pending.track_id != track_id {
            return Vec::new();
        }
        self.locked_next_id = Some(track_id.clone());
        if pending.generation == self.manual_selection_generation {
            self.pending_override = None;
        }
        self.dedup_broadcast(Event::SelectionReady(SelectionReadyPayload { track_id, direction: pending.direction }), false)
            .into_iter()
            .collect()
    }

    fn track_load_failed(&mut self, track_id: TrackId, reason: String) -> Vec<ConductorAction> {
        let mut actions = Vec::new();
        if self.next_track.as_ref() == Some(&track_id) {
            self.next_track = None;
        }
        if self.pending_override.as_ref().is_some_and(|p| p.track_id == track_id) {
            self.pending_override = None;
            self.locked_next_id = None;
        }
        if let Some(action) = self.dedup_broadcast(Event::SelectionFailed(SelectionFailedPayload { track_id, reason }), false) {
            actions.push(action);
        }
        actions.push(ConductorAction::ScheduleAutoRecovery { after_ms: AUTO_RECOVERY_DELAY_MS });
        actions
    }

    /// §4.6 "slot rotation" from the conductor's side: next becomes current,
    /// a journey-stack entry is pushed, and the explorer cache (keyed by the
    /// now-stale current track) is dropped.
    fn complete_transition(&mut self, corpus: &Corpus, now: Instant) -> Result<Vec<ConductorAction>, EngineError> {
        let mut actions = Vec::new();
        let Some(next) = self.next_track.take() else { return Ok(actions) };
        if let Some(previous) = self.current_track.replace(next.clone()) {
            self.push_history_id(previous);
        }
        if let Ok(track) = corpus.get(&next) {
            self.note_seen(track);
        }
        self.push_journey(next, self.pending_direction.take());
        self.locked_next_id = None;
        self.track_start_time = Some(now);
        self.explorer_cache = None;
        if let Some(action) = self.dedup_broadcast(Event::StackUpdate { index: self.stack_index, length: self.journey_stack.len() }, false) {
            actions.push(action);
        }
        Ok(actions)
    }

    fn push_journey(&mut self, track_id: TrackId, direction: Option<Direction>) {
        self.journey_stack.push(JourneyStackEntry { track_id, direction, resolution: self.resolution });
        self.stack_index = self.journey_stack.len() - 1;
    }

    fn push_history_id(&mut self, track_id: TrackId) {
        self.seen_tracks.insert(track_id.clone());
        self.history.push_back(track_id);
        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
        if self.history.len() >= FILTER_AFTER_HISTORY_LEN {
            self.filter_artists = true;
            self.filter_albums = true;
        }
    }

    fn note_seen(&mut self, track: &Track) {
        self.seen_artists.insert(track.artist.to_string());
        self.seen_albums.insert(track.album.to_string());
    }

    fn excluded(&self) -> HashSet<TrackId> {
        let mut set = self.seen_tracks.clone();
        if let Some(current) = &self.current_track {
            set.insert(current.clone());
        }
        set
    }

    fn passes_repeat_filters(&self, track: &TrackBrief) -> bool {
        if self.filter_artists && self.seen_artists.contains(track.artist.as_ref()) {
            return false;
        }
        if self.filter_albums && self.seen_albums.contains(track.album.as_ref()) {
            return false;
        }
        true
    }

    /// §4.5 "Broadcasts": an explorer snapshot fires when the current track
    /// changes (or the resolution does) and is otherwise suppressed, since
    /// late subscribers get the cached copy on connect rather than a replay.
    fn maybe_explorer_snapshot(&mut self, corpus: &Corpus) -> Result<Option<ConductorAction>, EngineError> {
        let Some(current_id) = self.current_track.clone() else { return Ok(None) };
        let key = (current_id.clone(), self.resolution);
        if self.explorer_snapshot_sent_for.as_ref() == Some(&key) {
            return Ok(None);
        }
        let current = corpus.get(&current_id)?;
        let data = self.explorer_data(corpus, current)?;
        self.explorer_snapshot_sent_for = Some(key);
        Ok(Some(ConductorAction::Broadcast(Event::ExplorerSnapshot(ExplorerSnapshotPayload {
            current_track_id: data.current_track_id,
            directions: data.directions,
            next_track: data.next_track,
        }))))
    }

    /// §4.4 final line: memoize `ExplorerData` by `(current_track_id, resolution)`.
    fn explorer_data(&mut self, corpus: &Corpus, current: &Track) -> Result<ExplorerData, EngineError> {
        if let Some(cached) = &self.explorer_cache {
            if cached.current_track_id == current.id && cached.resolution == self.resolution {
                return Ok(cached.clone());
            }
        }
        let excluded = self.excluded();
        let data = explorer::build_explorer_data(corpus, current, self.resolution, &excluded, self.max_dimensions, self.stack_total, self.stack_random)?;
        self.explorer_cache = Some(data.clone());
        Ok(data)
    }

    /// §4.5 "Next-track selection": explorer selection, or fall back to
    /// directional drift.
    fn select_next_from_candidates(
        &mut self,
        corpus: &Corpus,
        current: &Track,
    ) -> Result<Option<(TrackId, TransitionReason, Option<Direction>)>, EngineError> {
        let data = self.explorer_data(corpus, current)?;
        if let Some((track_id, direction)) = pick_explorer_candidate(self, &data) {
            return Ok(Some((track_id, TransitionReason::Explorer, direction)));
        }
        if let Some((track_id, direction)) = self.directional_drift_fallback(corpus, current)? {
            return Ok(Some((track_id, TransitionReason::DirectionalDrift, Some(direction))));
        }
        Ok(None)
    }

    /// §4.5 fallback: random direction, random candidate; widen to the total
    /// neighborhood if empty; fall back to a random corpus track if still
    /// empty.
    fn directional_drift_fallback(&self, corpus: &Corpus, current: &Track) -> Result<Option<(TrackId, Direction)>, EngineError> {
        use strum::IntoEnumIterator;
        use drift_types::{FeatureIndex, Polarity};

        let mut rng = rand::thread_rng();
        let excluded = self.excluded();
        let dimensions: Vec<FeatureIndex> = FeatureIndex::iter().collect();
        let Some(&dimension) = dimensions.choose(&mut rng) else { return Ok(None) };
        let polarity = if rng.gen_bool(0.5) { Polarity::Positive } else { Polarity::Negative };
        let direction = Direction::Feature { feature_index: dimension as usize, polarity };

        let result = directional::search_dimension(corpus, current, dimension, polarity, self.resolution)?;
        let candidates: Vec<usize> = result
            .candidates
            .iter()
            .map(|c| c.track_index)
            .filter(|&index| !excluded.contains(&corpus.tracks()[index].id))
            .collect();
        if let Some(&index) = candidates.choose(&mut rng) {
            return Ok(Some((corpus.tracks()[index].id.clone(), direction)));
        }

        let neighborhood = explorer::total_neighborhood(corpus, current, self.resolution)?;
        let widened: Vec<usize> = neighborhood.into_iter().filter(|&index| !excluded.contains(&corpus.tracks()[index].id)).collect();
        if let Some(&index) = widened.choose(&mut rng) {
            return Ok(Some((corpus.tracks()[index].id.clone(), direction)));
        }

        let all: Vec<usize> = (0..corpus.len()).filter(|&index| !excluded.contains(&corpus.tracks()[index].id)).collect();
        Ok(all.choose(&mut rng).map(|&index| (corpus.tracks()[index].id.clone(), direction)))
    }

    fn heartbeat_event(&self, corpus: &Corpus, now: Instant) -> Event {
        let current_track = self.current_track.as_ref().and_then(|id| corpus.get(id).ok()).map(TrackBrief::from);
        let elapsed_ms = self.track_start_time.map_or(0, |start| u64::try_from(now.duration_since(start).as_millis()).unwrap_or(u64::MAX));
        let duration_ms = current_track.as_ref().map_or(0, |t| (t.duration_seconds * 1000.0) as u64);
        let remaining_ms = duration_ms.saturating_sub(elapsed_ms);
        let next_track = self.next_track.as_ref().and_then(|id| corpus.get(id).ok()).map(TrackBrief::from);
        Event::Heartbeat(HeartbeatPayload {
            current_track,
            elapsed_ms,
            remaining_ms,
            next_track,
            override_pending: self.pending_override.is_some(),
            drift_active: matches!(self.last_transition_reason, Some(TransitionReason::DirectionalDrift)),
            audio_subscriber_count: self.audio_subscribers,
            event_subscriber_count: self.event_subscribers,
            fingerprint: self.current_fingerprint.clone(),
        })
    }

    fn maybe_heartbeat(&mut self, corpus: &Corpus, now: Instant) -> Option<ConductorAction> {
        let event = self.heartbeat_event(corpus, now);
        self.dedup_broadcast(event, false)
    }

    /// §4.5 "Broadcasts": dedup by canonical serialized form, except events
    /// whose [`Event::default_force`] is true (or an explicit `force`).
    fn dedup_broadcast(&mut self, event: Event, force: bool) -> Option<ConductorAction> {
        if force || event.default_force() {
            return Some(ConductorAction::Broadcast(event));
        }
        let key = event_kind(&event);
        let canonical = serde_json::to_string(&event).unwrap_or_default();
        if self.last_broadcast.get(key) == Some(&canonical) {
            return None;
        }
        self.last_broadcast.insert(key, canonical);
        Some(ConductorAction::Broadcast(event))
    }
}

fn pick_explorer_candidate(conductor: &SessionConductor, data: &ExplorerData) -> Option<(TrackId, Option<Direction>)> {
    if let Some(t) = &data.next_track {
        if conductor.passes_repeat_filters(t) {
            return Some((t.id.clone(), direction_for_track(data, &t.id)));
        }
    }
    for entry in &data.directions {
        for t in &entry.sample_tracks {
            if conductor.passes_repeat_filters(t) {
                return Some((t.id.clone(), Some(entry.direction)));
            }
        }
        if let Some(opposite) = &entry.opposite_direction {
            for t in &opposite.sample_tracks {
                if conductor.passes_repeat_filters(t) {
                    return Some((t.id.clone(), Some(opposite.direction)));
                }
            }
        }
    }
    None
}

fn direction_for_track(data: &ExplorerData, id: &TrackId) -> Option<Direction> {
    for entry in &data.directions {
        if entry.sample_tracks.iter().any(|t| &t.id == id) {
            return Some(entry.direction);
        }
        if let Some(opposite) = &entry.opposite_direction {
            if opposite.sample_tracks.iter().any(|t| &t.id == id) {
                return Some(opposite.direction);
            }
        }
    }
    None
}

fn event_kind(event: &Event) -> &'static str {
    match event {
        Event::Heartbeat(_) => "heartbeat",
        Event::ExplorerSnapshot(_) => "explorer_snapshot",
        Event::SelectionAck { .. } => "selection_ack",
        Event::SelectionReady(_) => "selection_ready",
        Event::SelectionFailed(_) => "selection_failed",
        Event::SelectionAutoRequeued { .. } => "selection_auto_requeued",
        Event::FlowOptions { .. } => "flow_options",
        Event::DirectionChange { .. } => "direction_change",
        Event::StackUpdate { .. } => "stack_update",
    }
}
