use async_trait::async_trait;

use crate::csv::{CsvPhase, CsvReason};

/// Records a phase transition as an event, the way a Kubernetes operator
/// would emit a core `Event` object against the CSV it just reconciled.
/// Kept as a trait so `csv-core` never depends on a concrete sink;
/// `tracing::warn!`/`tracing::debug!` call sites at the terminal decision
/// points double as the event record in the meantime for anything that
/// doesn't yet go through this trait.
#[async_trait]
pub trait EventRecorder: Send + Sync + 'static {
    async fn record(&self, namespace: &str, name: &str, phase: CsvPhase, reason: CsvReason, message: &str);
}

/// Discards every event. Used in tests and anywhere event recording isn't
/// wired up yet.
pub struct NoopEventRecorder;

#[async_trait]
impl EventRecorder for NoopEventRecorder {
    async fn record(&self, _namespace: &str, _name: &str, _phase: CsvPhase, _reason: CsvReason, _message: &str) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn noop_recorder_accepts_any_event() {
        let recorder = NoopEventRecorder;
        recorder
            .record("ns", "my-csv", CsvPhase::Succeeded, CsvReason::InstallSuccessful, "installed")
            .await;
    }
}
