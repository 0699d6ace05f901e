//! Runtime configuration and rating helpers.
//!
//! Everything the inference runtime would otherwise keep as hidden global
//! state (artifact origin, thread count, the SIMD-style optimization
//! toggle, timeout and cache knobs) lives in one struct, built once when
//! the facade starts and never mutated afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{
    CACHE_CAPACITY, CACHE_TTL, DEBOUNCE_DELAY, ENGINE_INIT_TIMEOUT, MAIA_RATINGS,
    MODEL_FETCH_TIMEOUT, PREDICT_TIMEOUT,
};
use crate::policy::DEFAULT_TOP_K;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Static origin serving `maia-<rating>.onnx` artifacts.
    pub model_base_url: String,
    /// Intra-op thread count handed to the runtime.
    pub intra_threads: usize,
    /// Enables the optimized kernel path. Dropped automatically once if
    /// session creation hits a protobuf parse failure.
    pub simd: bool,
    /// Candidates returned per prediction.
    pub top_k: usize,
    pub fetch_timeout_ms: u64,
    pub predict_timeout_ms: u64,
    pub init_timeout_ms: u64,
    pub cache_ttl_ms: u64,
    pub cache_capacity: usize,
    pub debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_base_url: "https://maia.chesscoach.dev/models".to_string(),
            intra_threads: 1,
            simd: true,
            top_k: DEFAULT_TOP_K,
            fetch_timeout_ms: MODEL_FETCH_TIMEOUT.as_millis() as u64,
            predict_timeout_ms: PREDICT_TIMEOUT.as_millis() as u64,
            init_timeout_ms: ENGINE_INIT_TIMEOUT.as_millis() as u64,
            cache_ttl_ms: CACHE_TTL.as_millis() as u64,
            cache_capacity: CACHE_CAPACITY,
            debounce_ms: DEBOUNCE_DELAY.as_millis() as u64,
        }
    }
}

impl EngineConfig {
    /// Artifact URL for a rating level.
    pub fn model_url(&self, rating: u16) -> String {
        format!("{}/maia-{}.onnx", self.model_base_url.trim_end_matches('/'), rating)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn predict_timeout(&self) -> Duration {
        Duration::from_millis(self.predict_timeout_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Rating levels with a published model, ascending.
pub fn available_ratings() -> &'static [u16] {
    &MAIA_RATINGS
}

/// Whether a rating level has a published model.
pub fn is_supported_rating(rating: u16) -> bool {
    MAIA_RATINGS.contains(&rating)
}

/// Published rating closest to an arbitrary target. Ties resolve to the
/// lower level.
pub fn closest_rating(target: i32) -> u16 {
    MAIA_RATINGS
        .iter()
        .copied()
        .min_by_key(|&r| ((r as i32 - target).abs(), r))
        .expect("rating table is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_url_has_the_published_shape() {
        let config = EngineConfig {
            model_base_url: "https://cdn.example.org/models/".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(config.model_url(1500), "https://cdn.example.org/models/maia-1500.onnx");
    }

    #[test]
    fn closest_rating_clamps_and_rounds() {
        assert_eq!(closest_rating(800), 1100);
        assert_eq!(closest_rating(2400), 1900);
        assert_eq!(closest_rating(1460), 1500);
        assert_eq!(closest_rating(1540), 1500);
        // Exact midpoint resolves to the lower level.
        assert_eq!(closest_rating(1150), 1100);
    }

    #[test]
    fn defaults_match_the_published_timeouts() {
        let config = EngineConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.predict_timeout(), Duration::from_secs(10));
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.top_k, 5);
    }
}
