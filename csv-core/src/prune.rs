//! L8 — Dangling-Child Pruner: pure predicate over a copy and its (possibly
//! absent) parent, per spec.md §4.5.

use csv_api::consts::{ANNOTATION_OPERATOR_NAMESPACE, ANNOTATION_TARGET_NAMESPACES};
use csv_api::csv::{ClusterServiceVersion, CsvReason};
use csv_api::namespace::NamespaceSet;

/// `Some(parent)` when the copy's parent is present in the lister
/// snapshot (same name, in the namespace named by the copy's
/// `olm.operatorNamespace` annotation); `None` when the annotation is
/// missing or the named parent cannot be found.
#[must_use]
pub fn resolve_parent<'a>(
    copy: &ClusterServiceVersion,
    parent_lookup: impl Fn(&str, &str) -> Option<&'a ClusterServiceVersion>,
) -> Option<&'a ClusterServiceVersion> {
    let operator_namespace = copy.annotation(ANNOTATION_OPERATOR_NAMESPACE)?;
    let name = copy.metadata.name.as_deref()?;
    parent_lookup(operator_namespace, name)
}

/// Whether `copy` should be deleted this tick. Checks every condition in
/// spec.md §4.5 in order; the first one that applies wins (they are not
/// mutually exclusive, but callers only need the verdict).
#[must_use]
pub fn is_dangling(copy: &ClusterServiceVersion, parent: Option<&ClusterServiceVersion>) -> bool {
    let Some(operator_namespace) = copy.annotation(ANNOTATION_OPERATOR_NAMESPACE) else {
        return true;
    };

    let copy_namespace = copy.metadata.namespace.as_deref().unwrap_or_default();
    if operator_namespace == copy_namespace {
        return true;
    }

    let Some(parent) = parent else {
        return true;
    };

    if parent.status.as_ref().is_some_and(|s| s.reason == CsvReason::InterOperatorGroupOwnerConflict) {
        return true;
    }

    let Some(target_annotation) = parent.annotation(ANNOTATION_TARGET_NAMESPACES) else {
        return true;
    };
    let targets = NamespaceSet::from_annotation(target_annotation);
    if !targets.is_all_namespaces() && !targets.contains(copy_namespace) {
        return true;
    }

    false
}

#[cfg(test)]
mod test {
    use super::*;
    use csv_api::csv::{ApiSurfaceSpec, CsvSpec, CsvStatus, DeploymentStrategy, InstallStrategy};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn copy(namespace: &str, operator_namespace: Option<&str>) -> ClusterServiceVersion {
        let mut annotations = BTreeMap::new();
        if let Some(ns) = operator_namespace {
            annotations.insert(ANNOTATION_OPERATOR_NAMESPACE.to_owned(), ns.to_owned());
        }
        ClusterServiceVersion {
            metadata: ObjectMeta {
                name: Some("etcd-operator".to_owned()),
                namespace: Some(namespace.to_owned()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: CsvSpec {
                install_strategy: InstallStrategy::Deployment(DeploymentStrategy::default()),
                install_modes: vec![],
                custom_resource_definitions: ApiSurfaceSpec::default(),
                api_service_definitions: ApiSurfaceSpec::default(),
                webhook_definitions: vec![],
                replaces: None,
                min_kube_version: None,
            },
            status: Some(CsvStatus { reason: CsvReason::Copied, ..Default::default() }),
        }
    }

    fn parent(namespace: &str, targets: &str, reason: CsvReason) -> ClusterServiceVersion {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_TARGET_NAMESPACES.to_owned(), targets.to_owned());
        let mut p = copy(namespace, None);
        p.metadata.annotations = Some(annotations);
        p.status = Some(CsvStatus { reason, ..Default::default() });
        p
    }

    #[test]
    fn dangling_without_operator_namespace_annotation() {
        let c = copy("team-a", None);
        assert!(is_dangling(&c, None));
    }

    #[test]
    fn dangling_when_parent_missing() {
        let c = copy("team-a", Some("operators"));
        assert!(is_dangling(&c, None));
    }

    #[test]
    fn dangling_when_parent_has_owner_conflict() {
        let c = copy("team-a", Some("operators"));
        let p = parent("operators", "team-a", CsvReason::InterOperatorGroupOwnerConflict);
        assert!(is_dangling(&c, Some(&p)));
    }

    #[test]
    fn dangling_when_namespace_no_longer_targeted() {
        let c = copy("team-a", Some("operators"));
        let p = parent("operators", "team-b", CsvReason::InstallSuccessful);
        assert!(is_dangling(&c, Some(&p)));
    }

    #[test]
    fn dangling_on_accidental_self_copy() {
        let c = copy("operators", Some("operators"));
        assert!(is_dangling(&c, None));
    }

    #[test]
    fn not_dangling_when_parent_healthy_and_still_targeted() {
        let c = copy("team-a", Some("operators"));
        let p = parent("operators", "team-a,team-b", CsvReason::InstallSuccessful);
        assert!(!is_dangling(&c, Some(&p)));
    }

    #[test]
    fn not_dangling_under_all_namespaces_target() {
        let c = copy("team-a", Some("operators"));
        let p = parent("operators", "", CsvReason::InstallSuccessful);
        assert!(!is_dangling(&c, Some(&p)));
    }
}
