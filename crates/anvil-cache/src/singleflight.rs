//! Single-flight execution: at most one concurrent build per key. Late
//! joiners await the in-progress attempt's result instead of starting
//! their own — the "dog-piling" guard shape used by content-addressed
//! caches that sit in front of expensive, idempotent work.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Deduplicates concurrent executions keyed by `K`. Each key gets its own
/// [`tokio::sync::OnceCell`]; the first caller to reach a key runs the
/// supplied future and populates the cell, every other caller for the same
/// key awaits that same cell instead of re-running the work.
pub struct InFlight<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for InFlight<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make` for `key`, or await the result of an already-in-progress
    /// run for the same key. The slot is released once `make` resolves, so
    /// a later call with the same key starts a fresh execution rather than
    /// replaying a stale cached value — single-flight only dedups
    /// *concurrent* callers, it is not a result cache.
    pub async fn execute_once<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut slots = self.slots.lock().await;
            slots.entry(key.clone()).or_default().clone()
        };

        let result = cell.get_or_init(make).await.clone();

        // Drop the slot once nobody else might still be waiting on it, so
        // a subsequent call for the same key re-executes rather than
        // serving a result that may now be stale (source changed, cache
        // evicted, etc.).
        let mut slots = self.slots.lock().await;
        if let Some(existing) = slots.get(&key) {
            if Arc::ptr_eq(existing, &cell) {
                slots.remove(&key);
            }
        }

        result
    }

    /// Number of keys with an execution currently in flight — for metrics
    /// and tests.
    pub async fn in_flight_count(&self) -> usize {
        self.slots.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_for_the_same_key_see_one_execution() {
        let inflight: Arc<InFlight<&'static str, u32>> = Arc::new(InFlight::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let inflight = inflight.clone();
            let executions = executions.clone();
            handles.push(tokio::spawn(async move {
                inflight
                    .execute_once("key", || async {
                        executions.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        42
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_execute_independently() {
        let inflight: InFlight<&'static str, u32> = InFlight::new();
        let a = inflight.execute_once("a", || async { 1 });
        let b = inflight.execute_once("b", || async { 2 });
        assert_eq!(tokio::join!(a, b), (1, 2));
    }

    #[tokio::test]
    async fn a_later_call_re_executes_after_the_first_completes() {
        let inflight: InFlight<&'static str, u32> = InFlight::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        inflight
            .execute_once("key", || async move { c.fetch_add(1, Ordering::SeqCst) })
            .await;
        let c = counter.clone();
        inflight
            .execute_once("key", || async move { c.fetch_add(1, Ordering::SeqCst) })
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
