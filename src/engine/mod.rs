// =============================================================================
// Inference Engine Module
// =============================================================================
//
// Async half of the crate: everything between "here is a FEN" and "here is
// a ranked move distribution" that involves time, I/O or a session.
//
// ```
// ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
// │   Coordinator   │    │     Cache /     │    │     Events      │
// │ (lifecycle)     │────│   Debouncer     │────│  (broadcast)    │
// └─────────────────┘    └─────────────────┘    └─────────────────┘
//          │
// ┌─────────────────┐    ┌─────────────────┐
// │ WorkerEngine /  │    │     Worker      │
// │  LocalEngine    │────│ (owns session)  │
// └─────────────────┘    └─────────────────┘
//          │                       │
// ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
// │     Types       │    │    Session      │    │     Fetch       │
// │ (errors, DTOs)  │    │ (ort backend)   │    │ (artifacts)     │
// └─────────────────┘    └─────────────────┘    └─────────────────┘
// ```
//
// The worker task owns the model session exclusively; facades talk to it
// through tagged messages with correlation ids. The coordinator picks a
// facade, owns the cache, and keeps the heuristic fallback wired in.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod fetch;
pub mod history;
pub mod local;
pub mod manager;
pub mod session;
pub mod types;
pub mod worker;

use async_trait::async_trait;

pub use cache::{PredictionCache, PredictionDebouncer};
pub use config::{available_ratings, closest_rating, is_supported_rating, EngineConfig};
pub use coordinator::EngineCoordinator;
pub use events::{EngineEvent, EventBus};
pub use history::PositionHistory;
pub use local::LocalEngine;
pub use manager::WorkerEngine;
pub use session::{HttpModelProvider, ModelProvider, OrtModel, PolicyModel};
pub use types::{EngineError, EngineResult, EngineState, InferenceResult, MAIA_RATINGS};

/// Capability set shared by the worker-backed and in-process facades.
#[async_trait]
pub trait MoveEngine: Send + Sync {
    /// Current state snapshot.
    async fn state(&self) -> EngineState;

    /// Load the model for a rating level, releasing any prior session.
    async fn load_model(&self, rating: u16) -> EngineResult<()>;

    /// Rank the legal moves of a position by predicted human probability.
    async fn predict(&self, fen: &str) -> EngineResult<InferenceResult>;

    /// Record a position as the most recent history entry.
    async fn update_history(&self, fen: &str);

    async fn clear_history(&self);

    /// Release the session and reject anything still pending.
    async fn dispose(&self);
}

// =============================================================================
// Test doubles
// =============================================================================
