//! End-to-end flows through the public API, with a model stub standing
//! in for real Maia weights.

use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array3;

use maia_engine::policy::MOVE_INDEX;
use maia_engine::scoring::{sample_move, score_user_pick};
use maia_engine::{
    EngineConfig, EngineCoordinator, EngineError, EngineResult, ModelProvider, MovePrediction,
    PolicyModel, POLICY_SIZE,
};

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
const FOOLS_MATE: &str = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A network that always answers with the same policy vector.
struct FixedModel {
    policy: Vec<f32>,
}

impl PolicyModel for FixedModel {
    fn infer(&mut self, _planes: Array3<f32>) -> EngineResult<Vec<f32>> {
        Ok(self.policy.clone())
    }
}

struct FixedProvider {
    policy: Vec<f32>,
}

#[async_trait]
impl ModelProvider for FixedProvider {
    async fn load(&self, _rating: u16) -> EngineResult<Box<dyn PolicyModel>> {
        Ok(Box::new(FixedModel {
            policy: self.policy.clone(),
        }))
    }
}

struct MissingProvider;

#[async_trait]
impl ModelProvider for MissingProvider {
    async fn load(&self, rating: u16) -> EngineResult<Box<dyn PolicyModel>> {
        Err(EngineError::ModelNotFound(rating))
    }
}

fn opening_policy() -> Vec<f32> {
    let mut policy = vec![0.0; POLICY_SIZE];
    for (uci, weight) in [("e2e4", 0.45), ("d2d4", 0.3), ("g1f3", 0.15), ("c2c4", 0.1)] {
        policy[MOVE_INDEX.index_of(uci).unwrap() as usize] = weight;
    }
    policy
}

#[tokio::test]
async fn startpos_prediction_and_deterministic_sampling() {
    init_logging();
    let provider = Arc::new(FixedProvider {
        policy: opening_policy(),
    });
    let engine = EngineCoordinator::with_provider(provider, EngineConfig::default()).await;

    engine.load_model(1500).await.unwrap();
    let state = engine.state().await;
    assert!(state.ready);
    assert_eq!(state.current_rating, Some(1500));

    let result = engine.predict(STARTPOS).await.unwrap();
    assert!(!result.predictions.is_empty());
    assert_eq!(result.rating, 1500);
    let total: f32 = result.predictions.iter().map(|p| p.probability).sum();
    assert!(total > 0.99 && total <= 1.0 + 1e-5);

    // Temperature zero sampling is the argmax, deterministically.
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let pick = sample_move(&result.predictions, 0.0, &mut rng).unwrap();
        assert_eq!(pick.uci, result.predictions[0].uci);
    }
}

#[tokio::test]
async fn black_reply_prediction_uses_the_rotated_frame() {
    init_logging();
    // Weight the rotated slots for the standard human replies to 1.e4.
    let mut policy = vec![0.0; POLICY_SIZE];
    for reply in ["e7e5", "c7c5", "e7e6", "c7c6"] {
        let rotated = maia_engine::policy::flip_uci(reply);
        policy[MOVE_INDEX.index_of(&rotated).unwrap() as usize] = 0.25;
    }
    let provider = Arc::new(FixedProvider { policy });
    let engine = EngineCoordinator::with_provider(provider, EngineConfig::default()).await;

    engine.load_model(1200).await.unwrap();
    let result = engine.predict(AFTER_E4).await.unwrap();
    let top4: Vec<&str> = result.predictions.iter().take(4).map(|p| p.uci.as_str()).collect();
    for reply in ["e7e5", "c7c5", "e7e6", "c7c6"] {
        assert!(top4.contains(&reply), "{} missing from {:?}", reply, top4);
    }
}

#[tokio::test]
async fn terminal_position_is_an_empty_non_error_result() {
    init_logging();
    let provider = Arc::new(FixedProvider {
        policy: vec![1.0; POLICY_SIZE],
    });
    let engine = EngineCoordinator::with_provider(provider, EngineConfig::default()).await;
    engine.load_model(1500).await.unwrap();

    let result = engine.predict(FOOLS_MATE).await.unwrap();
    assert!(result.predictions.is_empty());
}

#[tokio::test]
async fn missing_model_rejects_load_and_subsequent_predicts() {
    init_logging();
    let engine =
        EngineCoordinator::with_provider(Arc::new(MissingProvider), EngineConfig::default()).await;

    match engine.load_model(1500).await {
        Err(EngineError::ModelNotFound(1500)) => {}
        other => panic!("unexpected load outcome: {:?}", other),
    }
    let state = engine.state().await;
    assert!(!state.ready);
    assert!(state.last_error.is_some());

    match engine.predict(STARTPOS).await {
        Err(EngineError::NotLoaded) => {}
        other => panic!("unexpected predict outcome: {:?}", other),
    }
}

#[test]
fn reward_for_a_near_miss_pick() {
    let predictions: Vec<MovePrediction> = [("e2e4", 0.40), ("d2d4", 0.30), ("c2c4", 0.20), ("g1f3", 0.10)]
        .into_iter()
        .map(|(uci, probability)| MovePrediction {
            uci: uci.to_string(),
            san: uci.to_string(),
            from: uci[0..2].to_string(),
            to: uci[2..4].to_string(),
            promotion: None,
            probability,
        })
        .collect();

    let reward = score_user_pick(&predictions, "d2d4", "e2e4");
    assert!(!reward.is_correct);
    assert_eq!(reward.base_points, 0.0);
    assert!((reward.total_points - 3.0).abs() < 1e-6);
    assert!((reward.actual_probability - 0.40).abs() < 1e-6);
    assert!((reward.pick_probability - 0.30).abs() < 1e-6);
}
