//! Sampling, proper scoring, and the accuracy pipeline.
//!
//! Pure functions over prediction lists and caller-supplied evaluations.
//! Nothing here touches the network or suspends.

pub mod accuracy;
pub mod heuristic;
pub mod sampler;
pub mod score;

pub use accuracy::{
    accuracy_for_move, classify_phase, game_accuracy, move_accuracy, record_move,
    win_probability, GamePhase, MoveQuality, MoveRecord,
};
pub use heuristic::{heuristic_predictions, heuristic_result};
pub use sampler::{sample_move, sample_with_profile, SamplingProfile, DETERMINISTIC_CUTOFF};
pub use score::{
    brier_score, entropy, log_score, score_user_pick, PredictionDifficulty, PredictionReward,
};
