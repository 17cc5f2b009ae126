use async_trait::async_trait;
use csv_api::csv::{CsvPhase, CsvReason};
use csv_api::events::EventRecorder;
use tracing::info;

/// Emits one structured `tracing::info!` line per phase transition, with
/// `csv.namespace`/`csv.name`/`phase`/`reason` as fields so a log
/// aggregator can build the event history a real Kubernetes `Event`
/// object would otherwise carry.
pub struct TracingEventRecorder;

#[async_trait]
impl EventRecorder for TracingEventRecorder {
    async fn record(&self, namespace: &str, name: &str, phase: CsvPhase, reason: CsvReason, message: &str) {
        info!(csv.namespace = namespace, csv.name = name, ?phase, ?reason, message, "csv phase transition");
    }
}
