//! Lifecycle event broadcasting.
//!
//! The worker reports ready/loading/loaded/prediction/error transitions;
//! anyone holding a subscription (UI layers, tests) receives them without
//! coupling to the request/reply flow. Lagging subscribers lose old
//! events rather than blocking the worker.

use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    /// The worker came up and is accepting requests.
    Ready,
    Loading { rating: u16 },
    Loaded { rating: u16 },
    Prediction { request_id: u64, inference_ms: u64 },
    Error { message: String },
    Disposed,
}

/// Broadcast fan-out for lifecycle events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Emit to all current subscribers. Having none is not an error.
    pub fn emit(&self, event: EngineEvent) {
        debug!("Engine event: {:?}", event);
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
