//! Worker-backed engine facade.
//!
//! Owns the request side of the worker boundary: correlation ids, the
//! pending-request table, per-predict timeouts, the same-rating load
//! debounce, supersede semantics for competing loads, and the position
//! history shipped with every predict.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::config::{is_supported_rating, EngineConfig};
use super::events::{EngineEvent, EventBus};
use super::history::PositionHistory;
use super::session::ModelProvider;
use super::types::{EngineError, EngineResult, EngineState, InferenceResult};
use super::worker::{InferenceWorker, WorkerReply, WorkerRequest};
use super::MoveEngine;

type PendingTable = Arc<DashMap<u64, oneshot::Sender<WorkerReply>>>;

#[derive(Default)]
struct FacadeState {
    loading: bool,
    pending_load: Option<u16>,
    current: Option<u16>,
    last_error: Option<String>,
    disposed: bool,
}

pub struct WorkerEngine {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    pending: PendingTable,
    next_id: AtomicU64,
    generation: AtomicU64,
    generation_tx: watch::Sender<u64>,
    state: Mutex<FacadeState>,
    history: Mutex<PositionHistory>,
    events: EventBus,
    config: EngineConfig,
    _dispatcher: JoinHandle<()>,
    _worker: JoinHandle<()>,
}

impl WorkerEngine {
    /// Spawn the worker and wait for its readiness handshake within the
    /// configured init timeout.
    pub async fn spawn(
        provider: Arc<dyn ModelProvider>,
        config: EngineConfig,
        events: EventBus,
    ) -> EngineResult<Self> {
        let (generation_tx, generation_rx) = watch::channel(0u64);
        let mut ready = events.subscribe();
        let (requests, replies, worker) =
            InferenceWorker::spawn(provider, events.clone(), generation_rx);

        let handshake = async {
            loop {
                match ready.recv().await {
                    Ok(EngineEvent::Ready) => return true,
                    Ok(_) => continue,
                    Err(_) => return false,
                }
            }
        };
        match timeout(config.init_timeout(), handshake).await {
            Ok(true) => debug!("Worker handshake complete"),
            Ok(false) => {
                return Err(EngineError::WorkerUnavailable(
                    "worker stopped before becoming ready".to_string(),
                ))
            }
            Err(_) => {
                warn!("Worker failed to initialize within {:?}", config.init_timeout());
                return Err(EngineError::LoadTimeout);
            }
        }

        let pending: PendingTable = Arc::new(DashMap::new());
        let dispatcher = tokio::spawn(Self::dispatch_replies(replies, pending.clone()));

        Ok(Self {
            requests,
            pending,
            next_id: AtomicU64::new(1),
            generation: AtomicU64::new(0),
            generation_tx,
            state: Mutex::new(FacadeState::default()),
            history: Mutex::new(PositionHistory::new()),
            events,
            config,
            _dispatcher: dispatcher,
            _worker: worker,
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Route each tagged reply to whoever is still waiting on its id.
    /// Replies for requests that timed out or were rejected at dispose
    /// have no pending entry any more and are dropped.
    async fn dispatch_replies(mut replies: mpsc::UnboundedReceiver<WorkerReply>, pending: PendingTable) {
        while let Some(reply) = replies.recv().await {
            let id = reply.id();
            match pending.remove(&id) {
                Some((_, tx)) => {
                    let _ = tx.send(reply);
                }
                None => debug!("Dropping reply for vacated request {}", id),
            }
        }
        debug!("Reply dispatcher finished");
    }

    fn bump_generation(&self) -> u64 {
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.generation_tx.send(next);
        next
    }

    /// Send a request and await its correlated reply. A deadline turns
    /// into `PredictTimeout` and vacates the pending entry; a dropped
    /// reply channel means the engine went away mid-request.
    async fn request(
        &self,
        build: impl FnOnce(u64) -> WorkerRequest,
        deadline: Option<std::time::Duration>,
    ) -> EngineResult<WorkerReply> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if self.requests.send(build(id)).is_err() {
            self.pending.remove(&id);
            return Err(EngineError::WorkerUnavailable("worker channel closed".to_string()));
        }

        let awaited = async { rx.await.map_err(|_| EngineError::Disposed) };
        match deadline {
            Some(limit) => match timeout(limit, awaited).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.pending.remove(&id);
                    Err(EngineError::PredictTimeout)
                }
            },
            None => awaited.await,
        }
    }
}

#[async_trait]
impl MoveEngine for WorkerEngine {
    async fn state(&self) -> EngineState {
        let state = self.state.lock().await;
        EngineState {
            loading: state.loading,
            ready: state.current.is_some(),
            current_rating: state.current,
            last_error: state.last_error.clone(),
        }
    }

    async fn load_model(&self, rating: u16) -> EngineResult<()> {
        if !is_supported_rating(rating) {
            return Err(EngineError::ModelNotFound(rating));
        }

        let (generation, previous) = {
            let mut state = self.state.lock().await;
            if state.disposed {
                return Err(EngineError::Disposed);
            }
            if state.current == Some(rating) && !state.loading {
                debug!("Rating {} already loaded, skipping", rating);
                return Ok(());
            }
            // A different rating arriving mid-load supersedes the load in
            // flight; a repeat of the same rating just queues behind it.
            let generation = if state.loading && state.pending_load != Some(rating) {
                self.bump_generation()
            } else {
                self.generation.load(Ordering::SeqCst)
            };
            state.loading = true;
            state.pending_load = Some(rating);
            (generation, state.current)
        };

        info!("Requesting model load for rating {}", rating);
        let reply = self
            .request(|id| WorkerRequest::Load { id, rating, generation }, None)
            .await;

        let mut state = self.state.lock().await;
        if state.pending_load == Some(rating) {
            state.loading = false;
            state.pending_load = None;
        }
        match reply {
            Ok(WorkerReply::Loaded { rating: loaded, .. }) => {
                state.current = Some(loaded);
                state.last_error = None;
                drop(state);
                if previous != Some(loaded) {
                    self.history.lock().await.clear();
                }
                Ok(())
            }
            Ok(WorkerReply::Failed { error, .. }) => {
                if !matches!(error, EngineError::Superseded) {
                    state.current = None;
                    state.last_error = Some(error.to_string());
                }
                Err(error)
            }
            Ok(other) => Err(EngineError::WorkerUnavailable(format!(
                "unexpected reply to load: {:?}",
                other
            ))),
            Err(error) => {
                state.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn predict(&self, fen: &str) -> EngineResult<InferenceResult> {
        {
            let state = self.state.lock().await;
            if state.disposed {
                return Err(EngineError::Disposed);
            }
            if state.current.is_none() && !state.loading {
                return Err(EngineError::NotLoaded);
            }
        }

        let history = self.history.lock().await.snapshot();
        let fen = fen.to_string();
        let reply = self
            .request(
                move |id| WorkerRequest::Predict {
                    id,
                    fen,
                    history,
                    top_k: self.config.top_k,
                },
                Some(self.config.predict_timeout()),
            )
            .await?;

        match reply {
            WorkerReply::Prediction { result, .. } => Ok(result),
            WorkerReply::Failed { error, .. } => Err(error),
            other => Err(EngineError::WorkerUnavailable(format!(
                "unexpected reply to predict: {:?}",
                other
            ))),
        }
    }

    async fn update_history(&self, fen: &str) {
        self.history.lock().await.push(fen);
    }

    async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    async fn dispose(&self) {
        {
            let mut state = self.state.lock().await;
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.loading = false;
            state.pending_load = None;
            state.current = None;
        }

        // Abort any in-flight load, then reject everything still pending
        // before the worker drains its queue.
        self.bump_generation();
        self.pending.clear();

        info!("Disposing worker engine");
        let _ = self
            .request(
                |id| WorkerRequest::Dispose { id },
                Some(std::time::Duration::from_secs(1)),
            )
            .await;
        self.pending.clear();
        self.history.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{failing_provider, slow_provider, stub_provider};
    use crate::policy::POLICY_SIZE;

    const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    async fn engine_with(provider: Arc<dyn ModelProvider>) -> WorkerEngine {
        WorkerEngine::spawn(provider, EngineConfig::default(), EventBus::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn load_then_state_reports_ready() {
        let engine = engine_with(stub_provider(vec![0.0; POLICY_SIZE])).await;
        engine.load_model(1500).await.unwrap();
        let state = engine.state().await;
        assert!(state.ready);
        assert!(!state.loading);
        assert_eq!(state.current_rating, Some(1500));
        assert_eq!(state.last_error, None);
    }

    #[tokio::test]
    async fn unsupported_rating_is_model_not_found() {
        let engine = engine_with(stub_provider(vec![0.0; POLICY_SIZE])).await;
        match engine.load_model(1234).await {
            Err(EngineError::ModelNotFound(1234)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_load_reverts_state_and_predict_rejects() {
        let engine = engine_with(failing_provider()).await;
        match engine.load_model(1500).await {
            Err(EngineError::ModelNotFound(1500)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        let state = engine.state().await;
        assert!(!state.ready);
        assert!(state.last_error.is_some());

        match engine.predict(STARTPOS).await {
            Err(EngineError::NotLoaded) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn rapid_rating_switch_supersedes_the_first_load() {
        let provider = slow_provider(vec![0.0; POLICY_SIZE], std::time::Duration::from_millis(200));
        let engine = Arc::new(engine_with(provider).await);

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.load_model(1500).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let second = engine.load_model(1100).await;

        match first.await.unwrap() {
            Err(EngineError::Superseded) => {}
            other => panic!("first load should be superseded, got {:?}", other),
        }
        second.unwrap();
        assert_eq!(engine.state().await.current_rating, Some(1100));
    }

    #[tokio::test]
    async fn repeated_same_rating_load_is_debounced() {
        let provider = stub_provider(vec![0.0; POLICY_SIZE]);
        let loads = provider.loads.clone();
        let engine = engine_with(provider).await;
        engine.load_model(1700).await.unwrap();
        engine.load_model(1700).await.unwrap();
        engine.load_model(1700).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn successful_load_of_a_new_rating_clears_history() {
        let engine = engine_with(stub_provider(vec![0.0; POLICY_SIZE])).await;
        engine.load_model(1500).await.unwrap();
        engine.update_history(STARTPOS).await;
        assert_eq!(engine.history.lock().await.len(), 1);
        engine.load_model(1600).await.unwrap();
        assert!(engine.history.lock().await.is_empty());
    }

    #[tokio::test]
    async fn predict_returns_the_worker_result() {
        let engine = engine_with(stub_provider(vec![0.0; POLICY_SIZE])).await;
        engine.load_model(1500).await.unwrap();
        let result = engine.predict(STARTPOS).await.unwrap();
        assert_eq!(result.rating, 1500);
        assert_eq!(result.predictions.len(), 5);
        let total: f32 = result.predictions.iter().map(|p| p.probability).sum();
        assert!(total > 0.0 && total <= 1.0 + 1e-5);
    }

    #[tokio::test]
    async fn dispose_rejects_later_calls() {
        let engine = engine_with(stub_provider(vec![0.0; POLICY_SIZE])).await;
        engine.load_model(1500).await.unwrap();
        engine.dispose().await;

        match engine.predict(STARTPOS).await {
            Err(EngineError::Disposed) => {}
            other => panic!("unexpected: {:?}", other),
        }
        match engine.load_model(1500).await {
            Err(EngineError::Disposed) => {}
            other => panic!("unexpected: {:?}", other),
        }
        // A second dispose is a no-op.
        engine.dispose().await;
    }
}
