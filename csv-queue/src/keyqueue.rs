//! L10 — per-key coalescing work queue.
//!
//! Mirrors the client-go workqueue shape the source describes: a FIFO of
//! distinct keys, a dirty set recording "needs processing", and a
//! processing set recording "a worker currently owns this key". Adding a
//! key already dirty is a no-op; adding a key currently being processed
//! marks it dirty again so it is requeued the moment the worker finishes,
//! which is how mutual exclusion at key granularity (spec.md §5) is kept
//! without blocking the enqueuer.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

use tokio::sync::Notify;

struct State<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
}

/// A per-key coalescing, rate-limited-by-the-caller work queue.
pub struct KeyQueue<K> {
    state: Mutex<State<K>>,
    notify: Notify,
}

impl<K> Default for KeyQueue<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
            }),
            notify: Notify::new(),
        }
    }
}

impl<K> KeyQueue<K>
where
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as needing processing. Coalesces with any pending or
    /// in-flight request for the same key.
    pub fn add(&self, key: K) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Waits for and removes the next key to process, moving it from
    /// `dirty` into `processing`.
    pub async fn get(&self) -> K {
        loop {
            {
                let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return key;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Releases `key` from `processing`. If the key was re-added while a
    /// worker held it, it is pushed back onto the queue immediately.
    pub fn done(&self, key: &K) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn add_then_get_returns_the_key() {
        let q: KeyQueue<String> = KeyQueue::new();
        q.add("ns/csv1".to_owned());
        let got = q.get().await;
        assert_eq!(got, "ns/csv1");
    }

    #[tokio::test]
    async fn duplicate_add_while_pending_coalesces() {
        let q: KeyQueue<String> = KeyQueue::new();
        q.add("ns/csv1".to_owned());
        q.add("ns/csv1".to_owned());
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn add_while_processing_requeues_after_done() {
        let q: KeyQueue<String> = KeyQueue::new();
        q.add("ns/csv1".to_owned());
        let key = q.get().await;
        assert!(q.is_empty());
        q.add(key.clone()); // re-dirtied while in flight
        q.done(&key);
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn get_blocks_until_an_item_is_added() {
        let q = Arc::new(KeyQueue::<String>::new());
        let q2 = Arc::clone(&q);
        let handle = tokio::spawn(async move { q2.get().await });
        tokio::task::yield_now().await;
        q.add("ns/csv1".to_owned());
        let got = handle.await.unwrap();
        assert_eq!(got, "ns/csv1");
    }
}
