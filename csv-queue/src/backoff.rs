//! Exponential back-off bounded by a ceiling, the default controller rate
//! limiter named in spec.md §4.7.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

/// Per-key retry counters feeding an exponential-with-ceiling delay.
pub struct Backoff<K> {
    base: Duration,
    ceiling: Duration,
    failures: Mutex<HashMap<K, u32>>,
}

impl<K> Backoff<K>
where
    K: Eq + Hash + Clone,
{
    #[must_use]
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failure for `key` and returns the delay to wait before
    /// the next attempt.
    pub fn next_delay(&self, key: &K) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let count = failures.entry(key.clone()).or_insert(0);
        let delay = self.base.saturating_mul(1 << (*count).min(20)).min(self.ceiling);
        *count = count.saturating_add(1);
        delay
    }

    /// Clears the retry count for `key` after a successful sync.
    pub fn forget(&self, key: &K) {
        self.failures.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(key);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn delay_grows_and_is_bounded_by_ceiling() {
        let backoff: Backoff<String> = Backoff::new(Duration::from_millis(10), Duration::from_millis(100));
        let key = "ns/csv1".to_owned();
        let first = backoff.next_delay(&key);
        let second = backoff.next_delay(&key);
        assert!(second >= first);
        for _ in 0..20 {
            assert!(backoff.next_delay(&key) <= Duration::from_millis(100));
        }
    }

    #[test]
    fn forget_resets_the_counter() {
        let backoff: Backoff<String> = Backoff::new(Duration::from_millis(10), Duration::from_millis(1000));
        let key = "ns/csv1".to_owned();
        let _ = backoff.next_delay(&key);
        let _ = backoff.next_delay(&key);
        backoff.forget(&key);
        assert_eq!(backoff.next_delay(&key), Duration::from_millis(10));
    }
}
