//! Deduplicating work queue.
//!
//! Keys wait in FIFO order and appear at most once. A key handed to a worker
//! stays "processing" until `done`; adding it again in the meantime marks it
//! dirty and it is queued again on `done`, so one key is never reconciled by
//! two workers at once while distinct keys proceed in parallel.
//!
//! Failed keys are re-added after a per-key Fibonacci backoff which `forget`
//! resets.

use crate::backoff::FibonacciBackoff;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

struct QueueState<K> {
    queue: VecDeque<K>,
    /// Keys waiting to be processed (queued, or re-added while processing)
    dirty: HashSet<K>,
    processing: HashSet<K>,
    backoffs: HashMap<K, FibonacciBackoff>,
    shutting_down: bool,
}

/// Work queue of reconciliation keys.
pub struct WorkQueue<K> {
    state: Mutex<QueueState<K>>,
    notify: Notify,
    backoff_min: Duration,
    backoff_max: Duration,
}

impl<K> std::fmt::Debug for WorkQueue<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("backoff_min", &self.backoff_min)
            .field("backoff_max", &self.backoff_max)
            .finish_non_exhaustive()
    }
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Send + 'static,
{
    /// Creates a queue with retry delays between `backoff_min` and `backoff_max`.
    pub fn new(backoff_min: Duration, backoff_max: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                backoffs: HashMap::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
            backoff_min,
            backoff_max,
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState<K>> {
        // Nothing panics while holding the lock; recover the state if it ever does
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a key unless it is already waiting. Ignored after shutdown.
    pub fn add(&self, key: K) {
        let mut state = self.state();
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Adds a key after `delay`.
    pub fn add_after(self: &Arc<Self>, key: K, delay: Duration) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Adds a key after its next backoff delay and returns that delay.
    pub fn add_rate_limited(self: &Arc<Self>, key: K) -> Duration {
        let delay = {
            let mut state = self.state();
            state
                .backoffs
                .entry(key.clone())
                .or_insert_with(|| FibonacciBackoff::new(self.backoff_min, self.backoff_max))
                .next_backoff()
        };
        self.add_after(key, delay);
        delay
    }

    /// Resets the backoff of a key.
    pub fn forget(&self, key: &K) {
        self.state().backoffs.remove(key);
    }

    /// Waits for the next key. Returns `None` once the queue shuts down.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a notification in between is not lost
            notified.as_mut().enable();
            {
                let mut state = self.state();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Marks a key as processed, queueing it again if it was re-added meanwhile.
    pub fn done(&self, key: &K) {
        let mut state = self.state();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    /// Whether no key is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops handing out keys and wakes every waiting worker.
    pub fn shutdown(&self) {
        self.state().shutting_down = true;
        self.notify.notify_waiters();
    }
}
