use std::collections::HashMap;
use std::sync::Mutex;

use csv_api::csv::{CsvPhase, CsvReason};
use csv_queue::Queues;

/// Process-local counters exposed in Prometheus text format at `/metrics`.
/// No metrics crate appears anywhere in the retrieval pack, so this stays a
/// small hand-rolled exposition rather than pulling in a new dependency for
/// a handful of counters.
#[derive(Default)]
pub struct Metrics {
    phase_transitions: Mutex<HashMap<(CsvPhase, CsvReason), u64>>,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&self, phase: CsvPhase, reason: CsvReason) {
        let mut counters = self.phase_transitions.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry((phase, reason)).or_insert(0) += 1;
    }

    /// Renders the counters plus current queue depths as Prometheus text
    /// exposition format.
    #[must_use]
    pub fn render(&self, queues: &Queues) -> String {
        let mut out = String::new();
        out.push_str("# HELP csv_phase_transitions_total Phase transitions observed by the reconciler.\n");
        out.push_str("# TYPE csv_phase_transitions_total counter\n");
        let counters = self.phase_transitions.lock().unwrap_or_else(|e| e.into_inner());
        for ((phase, reason), count) in counters.iter() {
            out.push_str(&format!(
                "csv_phase_transitions_total{{phase=\"{phase:?}\",reason=\"{reason:?}\"}} {count}\n"
            ));
        }
        drop(counters);

        out.push_str("# HELP csv_queue_depth Pending keys in a work queue.\n");
        out.push_str("# TYPE csv_queue_depth gauge\n");
        for (name, depth) in [
            ("csv", queues.csv.len()),
            ("csv_copy", queues.csv_copy.len()),
            ("csv_gc", queues.csv_gc.len()),
            ("og", queues.og.len()),
            ("obj_gc", queues.obj_gc.len()),
        ] {
            out.push_str(&format!("csv_queue_depth{{queue=\"{name}\"}} {depth}\n"));
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn records_and_renders_a_transition() {
        let metrics = Metrics::new();
        metrics.record_transition(CsvPhase::Succeeded, CsvReason::InstallSuccessful);
        let counters = metrics.phase_transitions.lock().unwrap();
        assert_eq!(
            counters.get(&(CsvPhase::Succeeded, CsvReason::InstallSuccessful)),
            Some(&1)
        );
    }

    #[test]
    fn repeated_transitions_accumulate() {
        let metrics = Metrics::new();
        metrics.record_transition(CsvPhase::Pending, CsvReason::RequirementsUnknown);
        metrics.record_transition(CsvPhase::Pending, CsvReason::RequirementsUnknown);
        let counters = metrics.phase_transitions.lock().unwrap();
        assert_eq!(
            counters.get(&(CsvPhase::Pending, CsvReason::RequirementsUnknown)),
            Some(&2)
        );
    }
}
