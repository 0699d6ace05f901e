//! Background inference worker.
//!
//! One task owns the loaded model session exclusively. All interaction is
//! message passing: tagged requests in, tagged replies out, every message
//! carrying the correlation id the facade assigned. Requests are handled
//! strictly in order, so a predict sent during a load waits until the
//! load settles and two predicts never overlap on one session.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::events::{EngineEvent, EventBus};
use super::session::{ModelProvider, PolicyModel};
use super::types::{EngineError, EngineResult, InferenceResult};
use crate::policy::{decode_policy, encode_position, uniform_predictions};

// =============================================================================
// Message protocol
// =============================================================================

#[derive(Debug)]
pub enum WorkerRequest {
    Load {
        id: u64,
        rating: u16,
        /// Load generation at send time; a bump supersedes this request.
        generation: u64,
    },
    Predict {
        id: u64,
        fen: String,
        history: Vec<String>,
        top_k: usize,
    },
    Dispose {
        id: u64,
    },
}

#[derive(Debug)]
pub enum WorkerReply {
    Loaded { id: u64, rating: u16 },
    Prediction { id: u64, result: InferenceResult },
    Disposed { id: u64 },
    Failed { id: u64, error: EngineError },
}

impl WorkerReply {
    pub fn id(&self) -> u64 {
        match self {
            WorkerReply::Loaded { id, .. }
            | WorkerReply::Prediction { id, .. }
            | WorkerReply::Disposed { id }
            | WorkerReply::Failed { id, .. } => *id,
        }
    }
}

// =============================================================================
// Worker task
// =============================================================================

pub struct InferenceWorker {
    provider: Arc<dyn ModelProvider>,
    events: EventBus,
    generation: watch::Receiver<u64>,
    model: Option<Box<dyn PolicyModel>>,
    current_rating: Option<u16>,
}

impl InferenceWorker {
    /// Spawn the worker task. Returns the request sender and the reply
    /// stream the facade's dispatcher drains.
    pub fn spawn(
        provider: Arc<dyn ModelProvider>,
        events: EventBus,
        generation: watch::Receiver<u64>,
    ) -> (
        mpsc::UnboundedSender<WorkerRequest>,
        mpsc::UnboundedReceiver<WorkerReply>,
        JoinHandle<()>,
    ) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        let worker = Self {
            provider,
            events,
            generation,
            model: None,
            current_rating: None,
        };
        let handle = tokio::spawn(worker.run(req_rx, reply_tx));

        (req_tx, reply_rx, handle)
    }

    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
        replies: mpsc::UnboundedSender<WorkerReply>,
    ) {
        info!("Inference worker started");
        self.events.emit(EngineEvent::Ready);

        while let Some(request) = requests.recv().await {
            let reply = match request {
                WorkerRequest::Load { id, rating, generation } => {
                    match self.handle_load(rating, generation).await {
                        Ok(rating) => WorkerReply::Loaded { id, rating },
                        Err(error) => WorkerReply::Failed { id, error },
                    }
                }
                WorkerRequest::Predict { id, fen, history, top_k } => {
                    match self.handle_predict(&fen, &history, top_k) {
                        Ok(result) => {
                            self.events.emit(EngineEvent::Prediction {
                                request_id: id,
                                inference_ms: result.inference_ms,
                            });
                            WorkerReply::Prediction { id, result }
                        }
                        Err(error) => WorkerReply::Failed { id, error },
                    }
                }
                WorkerRequest::Dispose { id } => {
                    self.release();
                    self.events.emit(EngineEvent::Disposed);
                    let _ = replies.send(WorkerReply::Disposed { id });
                    break;
                }
            };

            if replies.send(reply).is_err() {
                debug!("Reply channel closed, stopping worker");
                break;
            }
        }

        self.release();
        info!("Inference worker stopped");
    }

    async fn handle_load(&mut self, rating: u16, generation: u64) -> EngineResult<u16> {
        if self.is_superseded(generation) {
            debug!("Load for rating {} superseded before it started", rating);
            return Err(EngineError::Superseded);
        }
        if self.current_rating == Some(rating) && self.model.is_some() {
            debug!("Rating {} already loaded, acknowledging", rating);
            return Ok(rating);
        }

        self.events.emit(EngineEvent::Loading { rating });
        // Loading a different rating atomically releases the prior
        // session before anything can observe both.
        self.release();

        let mut generation_rx = self.generation.clone();
        let loaded = tokio::select! {
            result = self.provider.load(rating) => result,
            _ = generation_rx.changed() => {
                info!("Load for rating {} aborted by a newer request", rating);
                Err(EngineError::Superseded)
            }
        };

        match loaded {
            Ok(model) => {
                if self.is_superseded(generation) {
                    debug!("Load for rating {} superseded after fetch", rating);
                    return Err(EngineError::Superseded);
                }
                self.model = Some(model);
                self.current_rating = Some(rating);
                self.events.emit(EngineEvent::Loaded { rating });
                info!("Model loaded for rating {}", rating);
                Ok(rating)
            }
            Err(error) => {
                if !matches!(error, EngineError::Superseded) {
                    error!("Model load failed for rating {}: {}", rating, error);
                    self.events.emit(EngineEvent::Error {
                        message: error.to_string(),
                    });
                }
                Err(error)
            }
        }
    }

    fn handle_predict(&mut self, fen: &str, history: &[String], top_k: usize) -> EngineResult<InferenceResult> {
        let rating = self.current_rating.ok_or(EngineError::NotLoaded)?;
        let model = self.model.as_mut().ok_or(EngineError::NotLoaded)?;
        run_inference(model.as_mut(), rating, fen, history, top_k)
    }

    fn is_superseded(&self, generation: u64) -> bool {
        *self.generation.borrow() != generation
    }

    fn release(&mut self) {
        if self.model.take().is_some() {
            debug!("Released model session for rating {:?}", self.current_rating);
        }
        self.current_rating = None;
    }
}

/// Encode, run and decode one prediction against a loaded model. Shared
/// by the worker and the in-process facade so the two paths cannot
/// drift apart.
pub(crate) fn run_inference(
    model: &mut dyn PolicyModel,
    rating: u16,
    fen: &str,
    history: &[String],
    top_k: usize,
) -> EngineResult<InferenceResult> {
    let planes = encode_position(fen, history)?;
    let started = Instant::now();
    let policy = model.infer(planes)?;
    let inference_ms = started.elapsed().as_millis() as u64;

    let mut fallback = false;
    let mut predictions = decode_policy(&policy, fen, top_k)?;
    if predictions.is_empty() {
        // Empty for a non-terminal position means the vocabulary and the
        // position disagree; degrade to uniform rather than fail.
        predictions = uniform_predictions(fen, top_k)?;
        if !predictions.is_empty() {
            warn!("Decode produced no candidates for {}, serving uniform", fen);
            fallback = true;
        }
    }

    Ok(InferenceResult {
        predictions,
        rating,
        inference_ms,
        fallback,
    })
}
