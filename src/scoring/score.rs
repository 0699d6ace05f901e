//! Proper scoring of user predictions against the realized move.
//!
//! Brier and logarithmic scores measure how well a predicted
//! distribution anticipated the move actually played; entropy classifies
//! how hard the position was to predict in the first place; the reward
//! calculation turns a user's pick into points for display.

use serde::{Deserialize, Serialize};

use crate::policy::MovePrediction;

/// Probability floor for the log score; the actual move being absent
/// from the distribution scores as this.
const LOG_SCORE_FLOOR: f64 = 0.001;

/// Brier score of a distribution against the move actually played.
/// Perfect confidence on the actual move scores 0. An actual move
/// missing from the distribution contributes a flat 1.
pub fn brier_score(predictions: &[MovePrediction], actual: &str) -> f64 {
    let mut score = 0.0;
    let mut seen = false;
    for p in predictions {
        let outcome = if p.uci == actual {
            seen = true;
            1.0
        } else {
            0.0
        };
        score += (p.probability as f64 - outcome).powi(2);
    }
    if !seen {
        score += 1.0;
    }
    score
}

/// Logarithmic score: −ln of the probability assigned to the actual
/// move, floored at 0.001.
pub fn log_score(predictions: &[MovePrediction], actual: &str) -> f64 {
    let p_actual = predictions
        .iter()
        .find(|p| p.uci == actual)
        .map(|p| p.probability as f64)
        .unwrap_or(LOG_SCORE_FLOOR)
        .max(LOG_SCORE_FLOOR);
    -p_actual.ln()
}

/// Shannon entropy of a distribution, in bits.
pub fn entropy(predictions: &[MovePrediction]) -> f64 {
    predictions
        .iter()
        .map(|p| p.probability as f64)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.log2())
        .sum()
}

/// How hard a position is to predict, bucketed by entropy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PredictionDifficulty {
    Easy,
    Medium,
    Hard,
}

impl PredictionDifficulty {
    pub fn from_entropy(bits: f64) -> Self {
        if bits < 1.0 {
            PredictionDifficulty::Easy
        } else if bits < 1.8 {
            PredictionDifficulty::Medium
        } else {
            PredictionDifficulty::Hard
        }
    }

    pub fn of(predictions: &[MovePrediction]) -> Self {
        Self::from_entropy(entropy(predictions))
    }
}

/// Points awarded for a user's pick against the realized move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionReward {
    pub is_correct: bool,
    pub base_points: f64,
    pub bonus_points: f64,
    pub total_points: f64,
    /// Probability the engine gave the move actually played.
    pub actual_probability: f64,
    /// Probability the engine gave the user's pick.
    pub pick_probability: f64,
}

/// Reward for picking `pick` when the opponent played `actual`: 50 base
/// points for a correct pick plus a bonus scaled by the distribution
/// (50·P(actual) when correct, 10·P(pick) as consolation otherwise).
pub fn score_user_pick(predictions: &[MovePrediction], pick: &str, actual: &str) -> PredictionReward {
    let probability_of = |uci: &str| {
        predictions
            .iter()
            .find(|p| p.uci == uci)
            .map(|p| p.probability as f64)
            .unwrap_or(0.0)
    };
    let actual_probability = probability_of(actual);
    let pick_probability = probability_of(pick);
    let is_correct = pick == actual;

    let base_points = if is_correct { 50.0 } else { 0.0 };
    let bonus_points = if is_correct {
        50.0 * actual_probability
    } else {
        10.0 * pick_probability
    };

    PredictionReward {
        is_correct,
        base_points,
        bonus_points,
        total_points: base_points + bonus_points,
        actual_probability,
        pick_probability,
    }
}
