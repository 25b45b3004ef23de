use serde::{Deserialize, Serialize};

use crate::direction::{Direction, DirectionEntry};
use crate::session::Fingerprint;
use crate::track::TrackBrief;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub current_track: Option<TrackBrief>,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    pub next_track: Option<TrackBrief>,
    pub override_pending: bool,
    pub drift_active: bool,
    pub audio_subscriber_count: usize,
    pub event_subscriber_count: usize,
    pub fingerprint: Option<Fingerprint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerSnapshotPayload {
    pub current_track_id: crate::track::TrackId,
    pub directions: Vec<DirectionEntry>,
    pub next_track: Option<TrackBrief>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionFailedPayload {
    pub track_id: crate::track::TrackId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionReadyPayload {
    pub track_id: crate::track::TrackId,
    pub direction: Option<Direction>,
}

/// Typed event fanned out by the event broadcaster. Each kind has a
/// canonical serialized form used for broadcast deduplication (see
/// `drift_core::broadcaster`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Heartbeat(HeartbeatPayload),
    ExplorerSnapshot(ExplorerSnapshotPayload),
    SelectionAck { track_id: crate::track::TrackId },
    SelectionReady(SelectionReadyPayload),
    SelectionFailed(SelectionFailedPayload),
    SelectionAutoRequeued { track_id: crate::track::TrackId },
    FlowOptions { directions: Vec<DirectionEntry> },
    DirectionChange { direction: Direction },
    StackUpdate { index: usize, length: usize },
}

impl Event {
    /// `true` for events whose emission should ignore deduplication (e.g.
    /// track-start heartbeats), matching §9's "except on force=true" rule.
    #[must_use]
    pub fn default_force(&self) -> bool {
        matches!(self, Self::SelectionReady(_) | Self::SelectionFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn event_serializes_with_snake_case_tag() {
        let event = Event::SelectionAck { track_id: crate::track::TrackId::new("x") };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "selection_ack");
    }
}
