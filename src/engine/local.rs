//! In-process engine facade.
//!
//! Same capability set as the worker-backed facade without the message
//! hop: the model session lives behind a mutex in the caller's process.
//! Used directly in tests and as the fallback when the worker fails to
//! come up.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::Mutex;

use super::config::{is_supported_rating, EngineConfig};
use super::events::{EngineEvent, EventBus};
use super::history::PositionHistory;
use super::session::{ModelProvider, PolicyModel};
use super::types::{EngineError, EngineResult, EngineState, InferenceResult};
use super::worker::run_inference;
use super::MoveEngine;

#[derive(Default)]
struct Inner {
    model: Option<Box<dyn PolicyModel>>,
    current: Option<u16>,
    loading: bool,
    last_error: Option<String>,
    disposed: bool,
}

/// Tracks competing load requests. A request for a different rating
/// bumps the generation, marking the load in progress as superseded;
/// repeats of the same rating share the ticket.
#[derive(Default)]
struct LoadTicket {
    generation: u64,
    requested: Option<u16>,
}

pub struct LocalEngine {
    provider: Arc<dyn ModelProvider>,
    config: EngineConfig,
    events: EventBus,
    inner: Mutex<Inner>,
    history: Mutex<PositionHistory>,
    ticket: std::sync::Mutex<LoadTicket>,
}

impl LocalEngine {
    pub fn new(provider: Arc<dyn ModelProvider>, config: EngineConfig, events: EventBus) -> Self {
        events.emit(EngineEvent::Ready);
        Self {
            provider,
            config,
            events,
            inner: Mutex::new(Inner::default()),
            history: Mutex::new(PositionHistory::new()),
            ticket: std::sync::Mutex::new(LoadTicket::default()),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

#[async_trait]
impl MoveEngine for LocalEngine {
    async fn state(&self) -> EngineState {
        let inner = self.inner.lock().await;
        EngineState {
            loading: inner.loading,
            ready: inner.current.is_some(),
            current_rating: inner.current,
            last_error: inner.last_error.clone(),
        }
    }

    async fn load_model(&self, rating: u16) -> EngineResult<()> {
        if !is_supported_rating(rating) {
            return Err(EngineError::ModelNotFound(rating));
        }

        let generation = {
            let mut ticket = self.ticket.lock().expect("load ticket lock poisoned");
            if ticket.requested.is_some() && ticket.requested != Some(rating) {
                ticket.generation += 1;
            }
            ticket.requested = Some(rating);
            ticket.generation
        };

        // The inner lock serializes loads; a newer different-rating
        // request parking here marks the one in progress as superseded.
        let mut inner = self.inner.lock().await;
        if inner.disposed {
            return Err(EngineError::Disposed);
        }
        if inner.current == Some(rating) && inner.model.is_some() {
            debug!("Rating {} already loaded, skipping", rating);
            return Ok(());
        }

        inner.loading = true;
        inner.model = None;
        inner.current = None;
        self.events.emit(EngineEvent::Loading { rating });

        let loaded = self.provider.load(rating).await;
        inner.loading = false;

        let stale = {
            let mut ticket = self.ticket.lock().expect("load ticket lock poisoned");
            let stale = ticket.generation != generation;
            if !stale {
                ticket.requested = None;
            }
            stale
        };
        if stale {
            info!("Load for rating {} superseded by a newer request", rating);
            return Err(EngineError::Superseded);
        }

        match loaded {
            Ok(model) => {
                inner.model = Some(model);
                inner.current = Some(rating);
                inner.last_error = None;
                drop(inner);
                self.history.lock().await.clear();
                self.events.emit(EngineEvent::Loaded { rating });
                info!("Model loaded in-process for rating {}", rating);
                Ok(())
            }
            Err(error) => {
                warn!("In-process model load failed for rating {}: {}", rating, error);
                inner.last_error = Some(error.to_string());
                self.events.emit(EngineEvent::Error {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn predict(&self, fen: &str) -> EngineResult<InferenceResult> {
        let history = self.history.lock().await.snapshot();
        let mut inner = self.inner.lock().await;
        if inner.disposed {
            return Err(EngineError::Disposed);
        }
        let rating = inner.current.ok_or(EngineError::NotLoaded)?;
        let model = inner.model.as_mut().ok_or(EngineError::NotLoaded)?;

        let result = run_inference(model.as_mut(), rating, fen, &history, self.config.top_k)?;
        self.events.emit(EngineEvent::Prediction {
            request_id: 0,
            inference_ms: result.inference_ms,
        });
        Ok(result)
    }

    async fn update_history(&self, fen: &str) {
        self.history.lock().await.push(fen);
    }

    async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    async fn dispose(&self) {
        let mut inner = self.inner.lock().await;
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.model = None;
        inner.current = None;
        drop(inner);
        self.history.lock().await.clear();
        self.events.emit(EngineEvent::Disposed);
    }
}
