//! Task lifecycle event fan-out.
//!
//! A single broadcast topic carries every task mutation to every connected
//! subscriber (WebSocket push channel, SSE bridge). Delivery is best-effort:
//! no backlog, no replay, and a send with zero subscribers is silently
//! dropped. Mutating requests never block or fail because of fan-out state.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::tasks::model::TaskRow;

/// Event kinds, serialized as the wire-level `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    Created,
    Updated,
    StatusChanged,
    Deleted,
}

/// Wire shape of one event: `{"type": ..., "task": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    #[serde(rename = "type")]
    pub kind: TaskEventKind,
    pub task: TaskRow,
}

/// Broadcasts serialized task events to all connected subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Send one task event to all connected subscribers.
    pub fn broadcast(&self, kind: TaskEventKind, task: &TaskRow) {
        let event = TaskEvent {
            kind,
            task: task.clone(),
        };
        // Ignore errors — no subscribers is fine
        let _ = self
            .tx
            .send(serde_json::to_string(&event).unwrap_or_default());
    }

    /// Subscribe to all broadcast events.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}
