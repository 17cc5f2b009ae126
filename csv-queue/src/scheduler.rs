//! L10 — Multi-Queue Scheduler: the five named queues from spec.md §4.7,
//! each owning its own `KeyQueue`/`Backoff` pair, plus the retry decision
//! that turns a sync's `SyncError` into either a requeue-with-delay or a
//! drop.

use std::time::Duration;

use csv_api::error::SyncError;

use crate::backoff::Backoff;
use crate::fanout::NamespacedName;
use crate::keyqueue::KeyQueue;

/// The five queues named in spec.md §4.7: `csv`, `csv-copy`, `csv-gc`,
/// `og`, and `obj-gc`. Kept as five separate fields (not a map) so each
/// queue's key type can differ without an enum indirection.
pub struct Queues {
    pub csv: KeyQueue<NamespacedName>,
    pub csv_copy: KeyQueue<NamespacedName>,
    pub csv_gc: KeyQueue<NamespacedName>,
    pub og: KeyQueue<NamespacedName>,
    pub obj_gc: KeyQueue<String>,
    csv_backoff: Backoff<NamespacedName>,
    csv_copy_backoff: Backoff<NamespacedName>,
    csv_gc_backoff: Backoff<NamespacedName>,
    og_backoff: Backoff<NamespacedName>,
    obj_gc_backoff: Backoff<String>,
}

impl Queues {
    #[must_use]
    pub fn new(backoff_base: Duration, backoff_ceiling: Duration) -> Self {
        Self {
            csv: KeyQueue::new(),
            csv_copy: KeyQueue::new(),
            csv_gc: KeyQueue::new(),
            og: KeyQueue::new(),
            obj_gc: KeyQueue::new(),
            csv_backoff: Backoff::new(backoff_base, backoff_ceiling),
            csv_copy_backoff: Backoff::new(backoff_base, backoff_ceiling),
            csv_gc_backoff: Backoff::new(backoff_base, backoff_ceiling),
            og_backoff: Backoff::new(backoff_base, backoff_ceiling),
            obj_gc_backoff: Backoff::new(backoff_base, backoff_ceiling),
        }
    }
}

/// What a worker should do after one sync attempt returned `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue after the given delay.
    Requeue(Duration),
    /// Do not retry; the error is permanent.
    Drop,
}

/// Turns a sync outcome into a retry decision, consulting `backoff` only
/// for errors the core marked retryable (`SyncError::is_retryable`).
pub fn decide_retry<K>(error: &SyncError, key: &K, backoff: &Backoff<K>) -> RetryDecision
where
    K: Eq + std::hash::Hash + Clone,
{
    if !error.is_retryable() {
        return RetryDecision::Drop;
    }
    RetryDecision::Requeue(backoff.next_delay(key))
}

/// A successful sync clears the key's retry history so the next failure
/// starts back at the base delay.
pub fn record_success<K>(key: &K, backoff: &Backoff<K>)
where
    K: Eq + std::hash::Hash + Clone,
{
    backoff.forget(key);
}

impl Queues {
    #[must_use]
    pub fn csv_backoff(&self) -> &Backoff<NamespacedName> {
        &self.csv_backoff
    }

    #[must_use]
    pub fn csv_copy_backoff(&self) -> &Backoff<NamespacedName> {
        &self.csv_copy_backoff
    }

    #[must_use]
    pub fn csv_gc_backoff(&self) -> &Backoff<NamespacedName> {
        &self.csv_gc_backoff
    }

    #[must_use]
    pub fn og_backoff(&self) -> &Backoff<NamespacedName> {
        &self.og_backoff
    }

    #[must_use]
    pub fn obj_gc_backoff(&self) -> &Backoff<String> {
        &self.obj_gc_backoff
    }
}
