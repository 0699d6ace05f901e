use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::MovePrediction;

// =============================================================================
// Constants
// =============================================================================

/// Timeout for fetching a model artifact from the static origin.
pub const MODEL_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the worker to come up and acknowledge readiness.
pub const ENGINE_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request prediction timeout.
pub const PREDICT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a cached prediction stays valid.
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// Cache entries kept before the oldest insertion is evicted.
pub const CACHE_CAPACITY: usize = 100;

/// Delay before a scheduled position change triggers an inference.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(100);

/// Most-recent prior positions shipped with each prediction.
pub const HISTORY_CAPACITY: usize = 7;

/// A model artifact smaller than this is a truncated or wrong file.
pub const MIN_MODEL_BYTES: usize = 1_000_000;

/// Rating levels with a published Maia network.
pub const MAIA_RATINGS: [u16; 9] = [1100, 1200, 1300, 1400, 1500, 1600, 1700, 1800, 1900];

// =============================================================================
// Error Types
// =============================================================================

/// Error taxonomy for the prediction engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no Maia model published for rating {0}")]
    ModelNotFound(u16),

    #[error("model load timed out")]
    LoadTimeout,

    #[error("inference runtime incompatible: {0}")]
    RuntimeIncompatible(String),

    #[error("no model loaded")]
    NotLoaded,

    #[error("prediction timed out")]
    PredictTimeout,

    #[error("load superseded by a newer request")]
    Superseded,

    #[error("engine disposed")]
    Disposed,

    #[error("model artifact invalid: {0}")]
    InvalidArtifact(String),

    #[error("inference worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("inference session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("FEN parsing error: {0}")]
    FenParsing(#[from] shakmaty::fen::ParseFenError),

    #[error("position setup error: {0}")]
    PositionSetup(#[from] shakmaty::PositionError<shakmaty::Chess>),
}

impl EngineError {
    /// Permanent failures engage the heuristic fallback; everything else
    /// is worth a retry.
    pub fn is_permanent(&self) -> bool {
        matches!(self, EngineError::RuntimeIncompatible(_) | EngineError::Disposed)
    }
}

impl From<ort::Error> for EngineError {
    fn from(err: ort::Error) -> Self {
        EngineError::Session(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Results and State
// =============================================================================

/// Outcome of a single inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    pub predictions: Vec<MovePrediction>,
    /// Rating label of the model that produced the distribution.
    pub rating: u16,
    pub inference_ms: u64,
    /// Set when the distribution came from the uniform or heuristic path
    /// rather than the network.
    #[serde(default)]
    pub fallback: bool,
}

/// Snapshot of the engine facade's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    pub loading: bool,
    pub ready: bool,
    pub current_rating: Option<u16>,
    pub last_error: Option<String>,
}
