//! The multi-queue scheduler and event fan-out (L10/L11): turns watch
//! events into per-key work items across five rate-limited queues.

pub mod backoff;
pub mod fanout;
pub mod keyqueue;
pub mod scheduler;

pub use backoff::Backoff;
pub use fanout::{route, NamespacedName, Route, WatchedObject};
pub use keyqueue::KeyQueue;
pub use scheduler::{decide_retry, record_success, Queues, RetryDecision};
