//! L7 — Copy Projector: pure decisions about copied-CSV placement and drift.

use chrono::{DateTime, Utc};
use csv_api::consts::COPIED_CSV_MESSAGE;
use csv_api::csv::{ClusterServiceVersion, CsvPhase, CsvReason, CsvStatus};
use csv_api::namespace::NamespaceSet;

/// Whether the Copy Projector should run at all for this tick: only
/// non-copy CSVs whose resolved target set reaches beyond their own
/// namespace need projecting.
#[must_use]
pub fn should_project(csv: &ClusterServiceVersion, targets: &NamespaceSet) -> bool {
    if csv.is_copy() {
        return false;
    }
    targets.is_all_namespaces() || targets.iter().any(|ns| Some(ns) != csv.metadata.namespace.as_deref())
}

/// The namespaces a copy is owed in, excluding the parent's own namespace.
/// `AllNamespaces` is not expanded here — the caller resolves it against
/// the live namespace list, since `csv-core` has no namespace listing.
#[must_use]
pub fn copy_target_namespaces<'a>(parent: &ClusterServiceVersion, targets: &'a NamespaceSet) -> Vec<&'a str> {
    targets
        .iter()
        .filter(|ns| Some(*ns) != parent.metadata.namespace.as_deref())
        .collect()
}

/// Builds the desired copy object for one target namespace: the parent's
/// spec and annotations verbatim, a fresh `Copied` status, no owner
/// reference (copies are cross-namespace and use the owner-label triple
/// pattern instead, like every other cluster-scoped/cross-namespace
/// artifact in this system).
#[must_use]
pub fn copy_spec_for(parent: &ClusterServiceVersion, target_namespace: &str, now: DateTime<Utc>) -> ClusterServiceVersion {
    let mut copy = parent.clone();
    copy.metadata.namespace = Some(target_namespace.to_owned());
    copy.metadata.resource_version = None;
    copy.metadata.uid = None;
    copy.status = Some(CsvStatus {
        phase: CsvPhase::Succeeded,
        reason: CsvReason::Copied,
        message: COPIED_CSV_MESSAGE.to_owned(),
        last_update_time: Some(now),
        last_transition_time: Some(now),
        ..Default::default()
    });
    copy
}

/// Whether an existing copy has drifted from what `copy_spec_for` would
/// produce and needs overwriting. Status and resource metadata are
/// excluded from the comparison; only spec and annotations count as
/// drift, per spec.md §4.5.
#[must_use]
pub fn has_drifted(existing: &ClusterServiceVersion, parent: &ClusterServiceVersion) -> bool {
    existing.spec != parent.spec || existing.metadata.annotations != parent.metadata.annotations
}
