//! Temperature-scaled sampling over a prediction list.
//!
//! Temperature reshapes the distribution before a categorical draw: low
//! values collapse onto the favourite, high values flatten towards
//! uniform. Below the deterministic cutoff the top prediction is
//! returned outright, no randomness involved.

use rand::Rng;

use crate::policy::MovePrediction;

/// Below this temperature sampling is argmax.
pub const DETERMINISTIC_CUTOFF: f64 = 0.01;

/// Named temperature presets for play styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingProfile {
    Deterministic,
    Conservative,
    Realistic,
    Exploratory,
    Random,
}

impl SamplingProfile {
    pub fn temperature(self) -> f64 {
        match self {
            SamplingProfile::Deterministic => 0.1,
            SamplingProfile::Conservative => 0.7,
            SamplingProfile::Realistic => 1.0,
            SamplingProfile::Exploratory => 1.3,
            SamplingProfile::Random => 2.0,
        }
    }
}

/// Draw one move from a prediction list at the given temperature.
/// Returns `None` for an empty list; the list is assumed sorted with the
/// most probable prediction first, as the decoder produces it.
pub fn sample_move<'a, R: Rng + ?Sized>(
    predictions: &'a [MovePrediction],
    temperature: f64,
    rng: &mut R,
) -> Option<&'a MovePrediction> {
    if predictions.is_empty() {
        return None;
    }
    if temperature < DETERMINISTIC_CUTOFF {
        return predictions.first();
    }

    let weights: Vec<f64> = predictions
        .iter()
        .map(|p| ((p.probability as f64).max(1e-10).ln() / temperature).exp())
        .collect();
    let total: f64 = weights.iter().sum();

    let draw = rng.gen::<f64>();
    let mut cumulative = 0.0;
    for (prediction, weight) in predictions.iter().zip(&weights) {
        cumulative += weight / total;
        if cumulative >= draw {
            return Some(prediction);
        }
    }
    // Floating-point round-off can leave the cumulative just shy of 1.
    predictions.last()
}

/// Sample with a preset profile and the thread-local generator.
pub fn sample_with_profile(
    predictions: &[MovePrediction],
    profile: SamplingProfile,
) -> Option<&MovePrediction> {
    sample_move(predictions, profile.temperature(), &mut rand::thread_rng())
}
