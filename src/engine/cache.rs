//! Prediction cache and position-change debouncer.
//!
//! Both live on the caller side of the worker boundary and are
//! single-writer. The cache is keyed by the full FEN string; the
//! debouncer collapses a burst of position changes into one inference.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::types::InferenceResult;

struct CacheEntry {
    result: InferenceResult,
    inserted: Instant,
}

/// FEN-keyed cache with a TTL and an insertion-order size bound.
pub struct PredictionCache {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    ttl: Duration,
    capacity: usize,
}

impl PredictionCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            capacity,
        }
    }

    /// Fresh cached result for a position, if any. Expired entries are
    /// dropped on access.
    pub fn get(&mut self, fen: &str) -> Option<InferenceResult> {
        match self.entries.get(fen) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => Some(entry.result.clone()),
            Some(_) => {
                self.entries.remove(fen);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, fen: &str, result: InferenceResult) {
        let entry = CacheEntry {
            result,
            inserted: Instant::now(),
        };
        if self.entries.insert(fen.to_string(), entry).is_none() {
            self.order.push_back(fen.to_string());
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Trailing-edge debouncer: the scheduled task runs after the delay
/// unless another schedule replaces it first.
pub struct PredictionDebouncer {
    delay: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PredictionDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            handle: Mutex::new(None),
        }
    }

    /// Schedule `task` after the delay, cancelling any prior schedule
    /// that has not fired yet.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let mut guard = self.handle.lock().expect("debouncer lock poisoned");
        if let Some(prior) = guard.take() {
            prior.abort();
        }
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    pub fn cancel(&self) {
        if let Some(prior) = self.handle.lock().expect("debouncer lock poisoned").take() {
            prior.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn result(rating: u16) -> InferenceResult {
        InferenceResult {
            predictions: Vec::new(),
            rating,
            inference_ms: 1,
            fallback: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_the_ttl() {
        let mut cache = PredictionCache::new(Duration::from_secs(30), 100);
        cache.insert("fen-a", result(1500));
        assert!(cache.get("fen-a").is_some());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.get("fen-a").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_insertion_is_evicted_at_capacity() {
        let mut cache = PredictionCache::new(Duration::from_secs(30), 3);
        for i in 0..4 {
            cache.insert(&format!("fen-{i}"), result(1100));
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.get("fen-0").is_none());
        assert!(cache.get("fen-3").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn reinserting_refreshes_without_duplicating() {
        let mut cache = PredictionCache::new(Duration::from_secs(30), 2);
        cache.insert("fen-a", result(1100));
        tokio::time::advance(Duration::from_secs(20)).await;
        cache.insert("fen-a", result(1900));
        tokio::time::advance(Duration::from_secs(20)).await;
        // Refreshed 20s ago, still fresh, and carrying the newer result.
        assert_eq!(cache.get("fen-a").unwrap().rating, 1900);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn a_new_schedule_cancels_the_prior_one() {
        let debouncer = PredictionDebouncer::new(Duration::from_millis(100));
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired = fired.clone();
            debouncer.schedule(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::advance(Duration::from_millis(50)).await;
        }
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_the_pending_fire() {
        let debouncer = PredictionDebouncer::new(Duration::from_millis(100));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
