//! Engine lifecycle coordination.
//!
//! Sits above the two facade implementations: picks the worker-backed
//! one and falls back to in-process when the worker cannot come up,
//! debounces rating changes and position changes, enforces at most one
//! concurrent load, owns the prediction cache, and downgrades to the
//! heuristic provider permanently when the runtime proves incompatible.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use tokio::sync::{broadcast, oneshot, Mutex};

use super::cache::{PredictionCache, PredictionDebouncer};
use super::config::EngineConfig;
use super::events::{EngineEvent, EventBus};
use super::local::LocalEngine;
use super::manager::WorkerEngine;
use super::session::{HttpModelProvider, ModelProvider};
use super::types::{EngineError, EngineResult, EngineState, InferenceResult};
use super::MoveEngine;
use crate::scoring::heuristic::heuristic_result;

pub struct EngineCoordinator {
    engine: Box<dyn MoveEngine>,
    config: EngineConfig,
    events: EventBus,
    cache: Mutex<PredictionCache>,
    predict_debouncer: PredictionDebouncer,
    load_debouncer: PredictionDebouncer,
    load_lock: Mutex<()>,
    /// Set once by a `RuntimeIncompatible` failure; never cleared.
    degraded: AtomicBool,
    /// Last rating asked for, used to label heuristic results. Zero
    /// means none yet.
    requested_rating: AtomicU32,
    /// Handle back to the owning `Arc`, for handing the coordinator to
    /// debounced tasks.
    weak_self: Weak<EngineCoordinator>,
}

impl EngineCoordinator {
    /// Production coordinator with the HTTP model provider.
    pub async fn new(config: EngineConfig) -> Arc<Self> {
        let provider = Arc::new(HttpModelProvider::new(config.clone()));
        Self::with_provider(provider, config).await
    }

    /// Coordinator over an explicit provider; tests hand in disposable
    /// stubs here.
    pub async fn with_provider(provider: Arc<dyn ModelProvider>, config: EngineConfig) -> Arc<Self> {
        let events = EventBus::default();
        let engine: Box<dyn MoveEngine> =
            match WorkerEngine::spawn(provider.clone(), config.clone(), events.clone()).await {
                Ok(worker) => Box::new(worker),
                Err(err) => {
                    warn!("Worker engine unavailable ({}), falling back to in-process", err);
                    Box::new(LocalEngine::new(provider, config.clone(), events.clone()))
                }
            };

        Arc::new_cyclic(|weak| Self {
            cache: Mutex::new(PredictionCache::new(config.cache_ttl(), config.cache_capacity)),
            predict_debouncer: PredictionDebouncer::new(config.debounce_delay()),
            load_debouncer: PredictionDebouncer::new(config.debounce_delay()),
            load_lock: Mutex::new(()),
            degraded: AtomicBool::new(false),
            requested_rating: AtomicU32::new(0),
            weak_self: weak.clone(),
            engine,
            config,
            events,
        })
    }

    fn strong(&self) -> Option<Arc<Self>> {
        self.weak_self.upgrade()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    fn rating_label(&self) -> u16 {
        self.requested_rating.load(Ordering::SeqCst) as u16
    }

    pub async fn state(&self) -> EngineState {
        self.engine.state().await
    }

    /// Load a model, serializing with any load already in progress.
    pub async fn load_model(&self, rating: u16) -> EngineResult<()> {
        if self.is_degraded() {
            return Err(EngineError::RuntimeIncompatible(
                "engine is in permanent heuristic fallback".to_string(),
            ));
        }

        let _guard = self.load_lock.lock().await;
        self.requested_rating.store(rating as u32, Ordering::SeqCst);
        match self.engine.load_model(rating).await {
            Ok(()) => {
                // Cached distributions belong to the previous model.
                self.cache.lock().await.clear();
                Ok(())
            }
            Err(error) => {
                if matches!(error, EngineError::RuntimeIncompatible(_)) {
                    warn!("Runtime incompatible, engaging permanent heuristic fallback");
                    self.degraded.store(true, Ordering::SeqCst);
                }
                Err(error)
            }
        }
    }

    /// Debounced rating change: the load fires after the configured
    /// delay unless a newer change replaces it first.
    pub fn set_rating(&self, rating: u16) {
        let Some(this) = self.strong() else { return };
        self.load_debouncer.schedule(async move {
            if let Err(error) = this.load_model(rating).await {
                warn!("Debounced load for rating {} failed: {}", rating, error);
            }
        });
    }

    /// Predict for a position, consulting the cache first. History is
    /// committed only after a successful, uncached inference.
    pub async fn predict(&self, fen: &str) -> EngineResult<InferenceResult> {
        if self.is_degraded() {
            return heuristic_result(fen, self.rating_label(), self.config.top_k);
        }

        if let Some(hit) = self.cache.lock().await.get(fen) {
            debug!("Prediction cache hit");
            return Ok(hit);
        }

        match self.engine.predict(fen).await {
            Ok(result) => {
                self.cache.lock().await.insert(fen, result.clone());
                self.engine.update_history(fen).await;
                Ok(result)
            }
            Err(EngineError::RuntimeIncompatible(reason)) => {
                warn!("Runtime incompatible during predict ({}), serving heuristic", reason);
                self.degraded.store(true, Ordering::SeqCst);
                heuristic_result(fen, self.rating_label(), self.config.top_k)
            }
            Err(error) => Err(error),
        }
    }

    /// Debounced position change: collapses a burst of changes into one
    /// inference after the configured delay.
    pub fn predict_debounced(&self, fen: &str) -> oneshot::Receiver<EngineResult<InferenceResult>> {
        let (tx, rx) = oneshot::channel();
        let Some(this) = self.strong() else { return rx };
        let fen = fen.to_string();
        self.predict_debouncer.schedule(async move {
            let _ = tx.send(this.predict(&fen).await);
        });
        rx
    }

    pub async fn update_history(&self, fen: &str) {
        self.engine.update_history(fen).await;
    }

    pub async fn clear_history(&self) {
        self.engine.clear_history().await;
    }

    pub async fn dispose(&self) {
        info!("Disposing engine coordinator");
        self.predict_debouncer.cancel();
        self.load_debouncer.cancel();
        self.cache.lock().await.clear();
        self.engine.dispose().await;
    }
}
