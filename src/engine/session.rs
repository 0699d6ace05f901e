//! Model session abstraction and the ONNX Runtime implementation.
//!
//! The worker and both facades talk to the model through two seams:
//! [`PolicyModel`] (run one inference) and [`ModelProvider`] (turn a
//! rating into a loaded model). Production wires these to `ort` and the
//! HTTP fetcher; tests construct disposable instances with neither
//! network nor weights.

use async_trait::async_trait;
use log::{debug, info, warn};
use ndarray::{Array3, Axis};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use reqwest::Client;

use super::config::EngineConfig;
use super::fetch::fetch_model;
use super::types::{EngineError, EngineResult};
use crate::policy::POLICY_SIZE;

/// One loaded network. `infer` takes the (112, 8, 8) plane tensor and
/// returns the raw policy vector, first output of the model.
pub trait PolicyModel: Send {
    fn infer(&mut self, planes: Array3<f32>) -> EngineResult<Vec<f32>>;
}

/// Turns a rating level into a loaded model. The fetch timeout is
/// enforced inside; callers only see the typed outcome.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn load(&self, rating: u16) -> EngineResult<Box<dyn PolicyModel>>;
}

// =============================================================================
// ONNX Runtime implementation
// =============================================================================

pub struct OrtModel {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OrtModel {
    /// Create a session from raw artifact bytes.
    ///
    /// Session creation with the optimized kernel path occasionally trips
    /// a protobuf parse failure on otherwise-valid artifacts; that exact
    /// failure gets one retry with the optimization disabled before the
    /// runtime is declared incompatible.
    pub fn from_bytes(bytes: &[u8], config: &EngineConfig) -> EngineResult<Self> {
        match Self::build(bytes, config.intra_threads, config.simd) {
            Ok(model) => Ok(model),
            Err(err) if config.simd && is_parse_failure(&err) => {
                warn!("Session creation hit a parse failure, retrying without optimized kernels: {}", err);
                Self::build(bytes, config.intra_threads, false)
                    .map_err(|retry| EngineError::RuntimeIncompatible(retry.to_string()))
            }
            Err(err) if is_parse_failure(&err) => Err(EngineError::RuntimeIncompatible(err.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    fn build(bytes: &[u8], intra_threads: usize, optimized: bool) -> ort::Result<Self> {
        let level = if optimized {
            GraphOptimizationLevel::Level3
        } else {
            GraphOptimizationLevel::Level1
        };
        let session = Session::builder()?
            .with_optimization_level(level)?
            .with_intra_threads(intra_threads)?
            .commit_from_memory(bytes)?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "input".to_string());
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .unwrap_or_else(|| "policy".to_string());
        debug!("Session ready: input={}, output={}", input_name, output_name);

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }
}

impl PolicyModel for OrtModel {
    fn infer(&mut self, planes: Array3<f32>) -> EngineResult<Vec<f32>> {
        let batched = planes.insert_axis(Axis(0));
        let outputs = self.session.run(ort::inputs! {
            self.input_name.as_str() => Tensor::from_array(batched)?,
        })?;

        let policy = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()?
            .iter()
            .copied()
            .collect::<Vec<f32>>();

        if policy.len() < POLICY_SIZE {
            return Err(EngineError::Session(format!(
                "policy output has {} entries, expected at least {}",
                policy.len(),
                POLICY_SIZE
            )));
        }
        Ok(policy)
    }
}

fn is_parse_failure(err: &ort::Error) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("protobuf") || message.contains("parse")
}

// =============================================================================
// HTTP-backed provider
// =============================================================================

/// Production provider: fetch the artifact over HTTPS, then build an
/// `ort` session from the bytes.
pub struct HttpModelProvider {
    client: Client,
    config: EngineConfig,
}

impl HttpModelProvider {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    async fn load(&self, rating: u16) -> EngineResult<Box<dyn PolicyModel>> {
        let bytes = fetch_model(&self.client, &self.config, rating).await?;
        info!("Building inference session for rating {} ({} bytes)", rating, bytes.len());
        let config = self.config.clone();
        // Session creation parses and optimizes the graph; keep it off
        // the async executor threads.
        let model = tokio::task::spawn_blocking(move || OrtModel::from_bytes(&bytes, &config))
            .await
            .map_err(|e| EngineError::WorkerUnavailable(e.to_string()))??;
        Ok(Box::new(model))
    }
}
