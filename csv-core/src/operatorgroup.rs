//! L12 — OperatorGroup Reconciler: namespace-selector evaluation, member-CSV
//! annotation decisions, and the cluster-role ensure-present check, as pure
//! functions over pre-fetched namespace/label state.

use csv_api::apisurface::ApiSurface;
use csv_api::namespace::NamespaceSet;
use csv_api::operatorgroup::{LabelSelector, OperatorGroupSpec};

/// All namespaces known to the cluster, with their labels, as pre-fetched
/// by the caller. Evaluating a selector is pure once this is in hand.
#[derive(Debug, Clone)]
pub struct NamespaceLabels {
    pub name: String,
    pub labels: std::collections::BTreeMap<String, String>,
}

/// Resolves `spec.selector`/`spec.targetNamespaces` into a concrete
/// namespace set, given the full namespace list. A selector present (even
/// empty) takes precedence over an explicit list, matching the "selector
/// absent" gating described in spec.md §3 for `OperatorGroupSpec`.
#[must_use]
pub fn resolve_target_namespaces(spec: &OperatorGroupSpec, all_namespaces: &[NamespaceLabels]) -> NamespaceSet {
    if let Some(selector) = &spec.selector {
        return resolve_selector(selector, all_namespaces);
    }
    match &spec.target_namespaces {
        Some(names) if !names.is_empty() => NamespaceSet::new(names.clone()),
        _ => NamespaceSet::all(),
    }
}

fn resolve_selector(selector: &LabelSelector, all_namespaces: &[NamespaceLabels]) -> NamespaceSet {
    if selector.is_empty() {
        return NamespaceSet::all();
    }
    let matching: Vec<String> = all_namespaces
        .iter()
        .filter(|ns| selector.match_labels.iter().all(|(k, v)| ns.labels.get(k) == Some(v)))
        .map(|ns| ns.name.clone())
        .collect();
    NamespaceSet::new(matching)
}

/// Whether the OperatorGroup's persisted `status.namespaces` needs to be
/// overwritten with a freshly resolved target set.
#[must_use]
pub fn status_needs_update(current: &NamespaceSet, resolved: &NamespaceSet) -> bool {
    current != resolved
}

/// A member CSV (one whose namespace is in the resolved target set) whose
/// group annotations are stale needs re-annotating; computed by the L6
/// transitioner per-CSV, this module only names which CSVs qualify as
/// members for the purpose of the group-level ensure-present pass.
#[must_use]
pub fn is_member(csv_namespace: &str, targets: &NamespaceSet) -> bool {
    targets.contains(csv_namespace)
}

/// Whether cluster roles granting view access to the group's aggregate
/// provided-API surface need to be (re-)ensured this tick: true whenever
/// the surface is non-empty, re-asserted on every steady-state tick the
/// same way `transition`'s `Succeeded` arm re-asserts them per-CSV.
#[must_use]
pub fn needs_cluster_roles(aggregate_provided: &ApiSurface) -> bool {
    !aggregate_provided.is_empty()
}
