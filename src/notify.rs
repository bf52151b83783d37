//! Fire-and-forget notification sink.
//!
//! Lifecycle operations hand events to a [`Notifier`] after their transaction
//! commits. Delivery runs on a spawned drain task; a failure is logged and
//! never blocks or rolls back the operation that produced it.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ChallengeReceived,
    ChallengeAccepted,
    ChallengeDeclined,
    TurnSubmitted,
    TurnJudged,
    MatchCompleted,
    MatchForfeited,
}

#[derive(Debug, Serialize)]
pub struct Notification {
    pub participant_id: Uuid,
    pub kind: EventKind,
    pub payload: Value,
}

/// Cheap-to-clone handle for enqueueing notifications.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Spawns the drain task and returns the sending handle. The drain is
    /// the seam where a real push transport plugs in; it currently logs each
    /// delivery.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        tokio::spawn(async move {
            while let Some(n) = rx.recv().await {
                info!(
                    participant = %n.participant_id,
                    kind = ?n.kind,
                    payload = %n.payload,
                    "notification delivered"
                );
            }
        });
        Self { tx }
    }

    pub fn notify(&self, participant_id: Uuid, kind: EventKind, payload: Value) {
        let n = Notification {
            participant_id,
            kind,
            payload,
        };
        if self.tx.send(n).is_err() {
            warn!(kind = ?kind, "notification drain is gone, event dropped");
        }
    }
}
