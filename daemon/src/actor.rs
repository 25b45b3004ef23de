//! Per-session actor task (§5 "Concurrency & Resource Model"): owns a
//! `SessionConductor`, `MixdownCache`, and `StreamingMixer`, driven by a
//! `ConductorInput` channel plus a fixed tick interval on its own
//! `tokio::spawn`ed task, since nothing here blocks except the codec, which
//! is offloaded separately.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use drift_analysis::Codec;
use drift_core::broadcaster::EventBroadcaster;
use drift_core::conductor::{ConductorAction, ConductorInput, SessionConductor};
use drift_core::corpus::Corpus;
use drift_core::fingerprint::FingerprintRegistry;
use drift_core::mixdown_cache::MixdownCache;
use drift_core::mixer::{MixerAction, MixerSlot, StreamingMixer};
use drift_core::sinks::{AudioSink, EventSink};
use drift_types::{SessionId, TrackId};

fn unix_ms_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Messages an actor can receive, a superset of `ConductorInput`: the
/// conductor only knows about session-visible transitions, but the actor
/// also needs to hear back from the background codec task.
enum ActorMessage {
    Conductor(ConductorInput),
    Prepared { track_id: TrackId, result: Result<drift_types::MixdownCacheEntry, String> },
}

/// A lightweight, cloneable client for talking to a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<ConductorInput>,
}

impl SessionHandle {
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// # Errors
    ///
    /// Returns an error if the actor task has already stopped.
    pub async fn send(&self, input: ConductorInput) -> Result<(), mpsc::error::SendError<ConductorInput>> {
        self.sender.send(input).await
    }
}

pub struct SessionActor<C, E, A> {
    session_id: SessionId,
    corpus: Arc<Corpus>,
    codec: Arc<C>,
    broadcaster: Arc<EventBroadcaster<E>>,
    audio_sink: Arc<A>,
    fingerprints: Arc<FingerprintRegistry>,
    last_fingerprinted_track: Option<TrackId>,
    conductor: SessionConductor,
    cache: MixdownCache,
    mixer: StreamingMixer,
    sample_rate: u32,
    channels: u16,
    bitrate_kbps: u32,
    silence_threshold: f32,
    tick_interval: Duration,
    inbox: mpsc::Receiver<ConductorInput>,
    internal_tx: mpsc::Sender<ActorMessage>,
    internal_rx: mpsc::Receiver<ActorMessage>,
}

#[allow(clippy::too_many_arguments)]
pub fn spawn_session<C, E, A>(
    session_id: SessionId,
    corpus: Arc<Corpus>,
    codec: Arc<C>,
    broadcaster: Arc<EventBroadcaster<E>>,
    audio_sink: Arc<A>,
    fingerprints: Arc<FingerprintRegistry>,
    conductor: SessionConductor,
    settings: &drift_core::config::EngineSettings,
) -> (SessionHandle, tokio::task::JoinHandle<()>)
where
    C: Codec + 'static,
    E: EventSink + 'static,
    A: AudioSink + 'static,
{
    let (tx, rx) = mpsc::channel(32);
    let (internal_tx, internal_rx) = mpsc::channel(32);
    let actor = SessionActor {
        session_id: session_id.clone(),
        corpus,
        codec,
        broadcaster,
        audio_sink,
        fingerprints,
        last_fingerprinted_track: None,
        conductor,
        cache: MixdownCache::new(settings.mixdown_cache_size),
        mixer: StreamingMixer::new(settings.chunk_size_bytes, settings.crossfade_duration_seconds, settings.tempo_tolerance),
        sample_rate: settings.sample_rate,
        channels: settings.channels,
        bitrate_kbps: settings.bitrate_kbps,
        silence_threshold: settings.silence_threshold,
        tick_interval: Duration::from_millis(settings.tick_interval_ms),
        inbox: rx,
        internal_tx,
        internal_rx,
    };
    let handle = SessionHandle { session_id, sender: tx };
    let join = tokio::spawn(actor.run());
    (handle, join)
}

impl<C, E, A> SessionActor<C, E, A>
where
    C: Codec + 'static,
    E: EventSink + 'static,
    A: AudioSink + 'static,
{
    async fn run(mut self) {
        self.maybe_rotate_fingerprint();
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.handle_conductor_input(ConductorInput::Tick);
                    self.tick_mixer();
                }
                maybe = self.inbox.recv() => {
                    match maybe {
                        Some(input) => self.handle_conductor_input(input),
                        None => break,
                    }
                }
                maybe = self.internal_rx.recv() => {
                    match maybe {
                        Some(ActorMessage::Prepared { track_id, result }) => self.handle_prepared(track_id, result),
                        Some(ActorMessage::Conductor(input)) => self.handle_conductor_input(input),
                        None => break,
                    }
                }
            }
        }
        self.fingerprints.remove_by_session(&self.session_id);
        log::info!("session {} actor stopped", self.session_id);
    }

    fn handle_conductor_input(&mut self, input: ConductorInput) {
        let now = Instant::now();
        let replay_on_connect = matches!(input, ConductorInput::EventSubscribe);
        match self.conductor.handle(&self.corpus, input, now) {
            Ok(actions) => {
                for action in actions {
                    self.apply_conductor_action(action);
                }
                if replay_on_connect {
                    self.broadcaster.replay_last_snapshot(&self.session_id);
                }
            }
            Err(err) => log::warn!("session {} conductor error: {err}", self.session_id),
        }
        self.maybe_rotate_fingerprint();
    }

    /// §4.9 "rotated on each track-started event": mint a fresh fingerprint
    /// whenever the conductor's current track has changed since the last
    /// check, and hand it back so the next heartbeat reports it.
    fn maybe_rotate_fingerprint(&mut self) {
        let Some(track_id) = self.conductor.current_track_id() else { return };
        if self.last_fingerprinted_track.as_ref() == Some(track_id) {
            return;
        }
        let track_id = track_id.clone();
        let fingerprint = self.fingerprints.register(&self.session_id, &track_id, unix_ms_now());
        self.conductor.set_fingerprint(fingerprint);
        self.last_fingerprinted_track = Some(track_id);
    }

    fn apply_conductor_action(&mut self, action: ConductorAction) {
        match action {
            ConductorAction::PrepareNext { track_id, .. } => self.prepare_next(track_id),
            ConductorAction::Broadcast(event) => self.broadcaster.broadcast(&self.session_id, event),
            ConductorAction::ForceCutTransition => {
                log::warn!("session {} forcing a cut transition past the crossfade guard", self.session_id);
            }
            ConductorAction::ScheduleRetry { after_ms } => self.schedule_delayed(ConductorInput::Tick, after_ms),
            ConductorAction::ScheduleAutoRecovery { after_ms } => self.schedule_delayed(ConductorInput::Tick, after_ms),
            ConductorAction::ClearMixdownCache => self.cache.clear(),
        }
    }

    fn schedule_delayed(&self, input: ConductorInput, after_ms: u64) {
        let sender = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after_ms)).await;
            let _ = sender.send(ActorMessage::Conductor(input)).await;
        });
    }

    /// §5 "Decode/encode work... must be offloaded to a worker": the
    /// blocking codec round trip plus analysis runs on a `spawn_blocking`
    /// task and reports back via the internal channel.
    fn prepare_next(&self, track_id: TrackId) {
        let Ok(track) = self.corpus.get(&track_id).map(Clone::clone) else {
            let sender = self.internal_tx.clone();
            let id = track_id.clone();
            tokio::spawn(async move {
                let _ = sender.send(ActorMessage::Prepared { track_id: id, result: Err("track not in corpus".into()) }).await;
            });
            return;
        };
        let codec = self.codec.clone();
        let sender = self.internal_tx.clone();
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let bitrate_kbps = self.bitrate_kbps;
        let silence_threshold = self.silence_threshold;
        let id_for_task = track_id.clone();

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || -> Result<drift_types::MixdownCacheEntry, String> {
                let pcm = codec.decode(&track.file_path, sample_rate, channels).map_err(|e| e.to_string())?;
                let analysis = drift_analysis::analyze(&pcm, sample_rate, channels, track.duration_seconds, silence_threshold)
                    .map_err(|e| e.to_string())?;
                let encoded = codec.encode(&pcm, sample_rate, channels, bitrate_kbps).map_err(|e| e.to_string())?;
                Ok(drift_types::MixdownCacheEntry {
                    encoded_buffer: Arc::from(encoded),
                    bpm: analysis.bpm,
                    key: analysis.key.clone(),
                    analysis,
                    timestamp_unix_ms: 0,
                })
            })
            .await
            .unwrap_or_else(|join_err| Err(join_err.to_string()));
            let _ = sender.send(ActorMessage::Prepared { track_id: id_for_task, result }).await;
        });
    }

    fn handle_prepared(&mut self, track_id: TrackId, result: Result<drift_types::MixdownCacheEntry, String>) {
        match result {
            Ok(entry) => {
                if let Ok(track) = self.corpus.get(&track_id) {
                    let slot = MixerSlot::new(
                        track_id.clone(),
                        entry.encoded_buffer.clone(),
                        entry.bpm,
                        entry.key.clone(),
                        entry.analysis.actual_duration_seconds,
                        entry.analysis.crossfade_lead_time_seconds,
                    );
                    self.mixer.load_next(slot);
                    self.cache.insert(track.file_path.clone(), entry);
                }
                self.handle_conductor_input(ConductorInput::TrackLoaded { track_id });
            }
            Err(reason) => self.handle_conductor_input(ConductorInput::TrackLoadFailed { track_id, reason }),
        }
    }

    fn tick_mixer(&mut self) {
        let has_subscribers = self.audio_sink.has_clients(&self.session_id);
        for action in self.mixer.tick(Instant::now(), has_subscribers) {
            match action {
                MixerAction::EmitChunk { bytes, .. } => {
                    if !self.audio_sink.write(&self.session_id, &bytes) {
                        log::warn!("session {} audio sink rejected a chunk; subscriber likely gone", self.session_id);
                    }
                }
                MixerAction::CrossfadeStarted => self.handle_conductor_input(ConductorInput::CrossfadeStarted),
                MixerAction::CrossfadeCompleted => self.handle_conductor_input(ConductorInput::CrossfadeCompleted),
                MixerAction::TrackEnded => self.handle_conductor_input(ConductorInput::TrackEnded),
                MixerAction::TimingWarning { wall_clock_remaining_seconds, byte_remaining_seconds } => {
                    log::warn!(
                        "session {} mixer timing disagreement: wall {wall_clock_remaining_seconds:.2}s vs bytes {byte_remaining_seconds:.2}s",
                        self.session_id
                    );
                }
            }
        }
    }
}
