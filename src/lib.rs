//! Human-move prediction engine built on the Maia policy networks.
//!
//! Give it a chess position and it returns a ranked probability
//! distribution over the legal moves a human of a chosen rating would
//! play, plus the derived products the surrounding product needs:
//! temperature-sampled opponent moves, Brier/log scoring of user
//! predictions, and the centipawn → win-probability → accuracy pipeline.
//!
//! Inference runs on a background worker task that owns the ONNX session
//! exclusively; callers talk to it through the [`EngineCoordinator`] or
//! one of the [`MoveEngine`] facades.
//!
//! ```no_run
//! use maia_engine::{EngineConfig, EngineCoordinator};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = EngineCoordinator::new(EngineConfig::default()).await;
//! engine.load_model(1500).await?;
//! let result = engine
//!     .predict("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
//!     .await?;
//! println!("most human move: {}", result.predictions[0].san);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod policy;
pub mod scoring;

use std::sync::Arc;

use once_cell::sync::OnceCell;

pub use engine::{
    available_ratings, closest_rating, is_supported_rating, EngineConfig, EngineCoordinator,
    EngineError, EngineEvent, EngineResult, EngineState, InferenceResult, LocalEngine,
    ModelProvider, MoveEngine, PolicyModel, WorkerEngine, MAIA_RATINGS,
};
pub use policy::{decode_policy, encode_position, MovePrediction, POLICY_SIZE};
pub use scoring::{
    brier_score, game_accuracy, log_score, sample_move, score_user_pick, win_probability,
    GamePhase, MoveQuality, MoveRecord, PredictionDifficulty, PredictionReward, SamplingProfile,
};

static DEFAULT_ENGINE: OnceCell<Arc<EngineCoordinator>> = OnceCell::new();

/// Initialize the process-wide default engine. The first call installs
/// the coordinator and returns it; later calls leave the existing one in
/// place and return it unchanged. Library internals never construct this
/// implicitly, so tests can always build their own disposable
/// coordinators instead.
pub async fn init_default_engine(config: EngineConfig) -> &'static Arc<EngineCoordinator> {
    let coordinator = EngineCoordinator::new(config).await;
    DEFAULT_ENGINE.get_or_init(|| coordinator)
}

/// The default engine, if [`init_default_engine`] has run.
pub fn default_engine() -> Option<&'static Arc<EngineCoordinator>> {
    DEFAULT_ENGINE.get()
}
