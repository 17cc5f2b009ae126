//! L11 — Event fan-out: which queue(s) a watched object's mutation routes
//! to, per spec.md §4.7.

/// The four cluster-scoped kinds eligible for orphan collection via an
/// owner-label triple, per spec.md §4.6/§6.
pub const CLUSTER_SCOPED_OWNED_KINDS: &[&str] = &[
    "ClusterRole",
    "ClusterRoleBinding",
    "MutatingWebhookConfiguration",
    "ValidatingWebhookConfiguration",
];

/// A namespace/name pair, used as both a CSV key and an OperatorGroup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

/// One routing decision: which queue, and what key to enqueue on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Csv(NamespacedName),
    CsvCopy(NamespacedName),
    CsvGc(NamespacedName),
    Og(NamespacedName),
    ObjGc { kind: String, name: String },
}

/// Everything the fan-out needs to know about one watched object's
/// mutation to compute its routes, pre-extracted by the watch-event
/// handler (no live lookups happen in this pure function; namespace
/// membership and CRD label matching are resolved by the caller from its
/// lister caches and passed in already computed).
#[derive(Debug, Clone)]
pub enum WatchedObject<'a> {
    Csv { key: NamespacedName, is_copy: bool },
    OperatorGroup { key: NamespacedName },
    /// A Namespace mutation; `member_of` lists every OperatorGroup whose
    /// resolved status-namespace set already contains this namespace.
    Namespace { member_of: &'a [NamespacedName] },
    /// An object carrying a native Kubernetes owner reference to a CSV.
    OwnedByCsvReference { owner: NamespacedName },
    /// An object carrying the `olm.owner*` label triple instead of a
    /// native owner reference (cross-namespace or cluster-scoped).
    OwnedByCsvLabel { owner: NamespacedName, kind: &'a str, name: &'a str, owner_exists: bool },
    /// A CustomResourceDefinition mutation; `matching_csvs` is every CSV
    /// whose `olm.api.<hash>` labels name this CRD's (group, version,
    /// kind), pre-resolved by the caller from the label index.
    Crd { matching_csvs: &'a [NamespacedName] },
}

/// Computes the set of queue routes for one watched-object mutation.
#[must_use]
pub fn route(object: &WatchedObject<'_>) -> Vec<Route> {
    match object {
        WatchedObject::Csv { key, is_copy } => {
            if *is_copy {
                vec![Route::CsvGc(key.clone())]
            } else {
                vec![Route::Csv(key.clone())]
            }
        }
        WatchedObject::OperatorGroup { key } => vec![Route::Og(key.clone())],
        WatchedObject::Namespace { member_of } => {
            member_of.iter().cloned().map(Route::Og).collect()
        }
        WatchedObject::OwnedByCsvReference { owner } => vec![Route::Csv(owner.clone())],
        WatchedObject::OwnedByCsvLabel { owner, kind, name, owner_exists } => {
            let mut routes = vec![Route::Csv(owner.clone())];
            if !owner_exists && CLUSTER_SCOPED_OWNED_KINDS.contains(kind) {
                routes.push(Route::ObjGc { kind: (*kind).to_owned(), name: (*name).to_owned() });
            }
            routes
        }
        WatchedObject::Crd { matching_csvs } => {
            matching_csvs.iter().cloned().map(Route::Csv).collect()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn non_copy_csv_routes_to_csv_queue() {
        let obj = WatchedObject::Csv { key: NamespacedName::new("ns", "csv1"), is_copy: false };
        assert_eq!(route(&obj), vec![Route::Csv(NamespacedName::new("ns", "csv1"))]);
    }

    #[test]
    fn copy_csv_routes_to_csv_gc_queue() {
        let obj = WatchedObject::Csv { key: NamespacedName::new("team-a", "csv1"), is_copy: true };
        assert_eq!(route(&obj), vec![Route::CsvGc(NamespacedName::new("team-a", "csv1"))]);
    }

    #[test]
    fn namespace_mutation_fans_out_to_every_member_group() {
        let groups = vec![NamespacedName::new("ns1", "og1"), NamespacedName::new("ns2", "og2")];
        let obj = WatchedObject::Namespace { member_of: &groups };
        assert_eq!(route(&obj), vec![Route::Og(groups[0].clone()), Route::Og(groups[1].clone())]);
    }

    #[test]
    fn owner_label_object_with_live_owner_only_enqueues_csv() {
        let obj = WatchedObject::OwnedByCsvLabel {
            owner: NamespacedName::new("ns", "csv1"),
            kind: "ClusterRole",
            name: "csv1-view",
            owner_exists: true,
        };
        assert_eq!(route(&obj), vec![Route::Csv(NamespacedName::new("ns", "csv1"))]);
    }

    #[test]
    fn owner_label_object_with_gone_cluster_scoped_owner_also_enqueues_obj_gc() {
        let obj = WatchedObject::OwnedByCsvLabel {
            owner: NamespacedName::new("ns", "csv1"),
            kind: "ClusterRole",
            name: "csv1-view",
            owner_exists: false,
        };
        assert_eq!(
            route(&obj),
            vec![
                Route::Csv(NamespacedName::new("ns", "csv1")),
                Route::ObjGc { kind: "ClusterRole".to_owned(), name: "csv1-view".to_owned() },
            ]
        );
    }

    #[test]
    fn owner_label_object_with_gone_non_cluster_scoped_owner_does_not_enqueue_obj_gc() {
        let obj = WatchedObject::OwnedByCsvLabel {
            owner: NamespacedName::new("ns", "csv1"),
            kind: "Secret",
            name: "csv1-cert",
            owner_exists: false,
        };
        assert_eq!(route(&obj), vec![Route::Csv(NamespacedName::new("ns", "csv1"))]);
    }

    #[test]
    fn crd_mutation_fans_out_to_every_matching_csv() {
        let csvs = vec![NamespacedName::new("ns1", "a"), NamespacedName::new("ns2", "b")];
        let obj = WatchedObject::Crd { matching_csvs: &csvs };
        assert_eq!(route(&obj), vec![Route::Csv(csvs[0].clone()), Route::Csv(csvs[1].clone())]);
    }
}
