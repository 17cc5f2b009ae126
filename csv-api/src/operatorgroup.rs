use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::apisurface::ApiSurface;
use crate::consts::ANNOTATION_PROVIDED_APIS;
use crate::namespace::NamespaceSet;

/// Policy object naming the namespaces over which its member CSVs operate
/// and arbitrating provided-API ownership. See spec.md §3.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "operators.coreos.com",
    version = "v1",
    kind = "OperatorGroup",
    plural = "operatorgroups",
    shortname = "og",
    namespaced
)]
#[kube(status = "OperatorGroupStatus")]
pub struct OperatorGroupSpec {
    /// Label selector over namespaces; an empty selector means "all
    /// namespaces".
    #[serde(default)]
    pub selector: Option<LabelSelector>,
    /// Explicit target namespace list; used when `selector` is absent.
    #[serde(default)]
    pub target_namespaces: Option<Vec<String>>,
    /// When true, the `providedAPIs` annotation is frozen and the
    /// intersection reconciler must not write Add/Remove mutations to it.
    #[serde(default)]
    pub static_provided_apis: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: std::collections::BTreeMap<String, String>,
}

impl LabelSelector {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct OperatorGroupStatus {
    /// Resolved target-namespace list; all-namespaces is a single empty
    /// string element, matching the wire contract in spec.md §3.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl OperatorGroupStatus {
    #[must_use]
    pub fn namespace_set(&self) -> NamespaceSet {
        if self.namespaces.iter().any(String::is_empty) {
            return NamespaceSet::all();
        }
        NamespaceSet::new(self.namespaces.clone())
    }
}

impl OperatorGroup {
    #[must_use]
    pub fn provided_apis(&self) -> ApiSurface {
        self.annotation(ANNOTATION_PROVIDED_APIS)
            .map(ApiSurface::from_annotation)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn target_namespace_set(&self) -> NamespaceSet {
        self.status
            .as_ref()
            .map(OperatorGroupStatus::namespace_set)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }

    /// Two OperatorGroups intersect when their resolved target-namespace
    /// sets share at least one namespace. All-namespaces intersects
    /// everything, including another all-namespaces group.
    #[must_use]
    pub fn intersects(&self, other: &OperatorGroup) -> bool {
        self.target_namespace_set()
            .intersects(&other.target_namespace_set())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn og_with(namespaces: &[&str], provided: &str) -> OperatorGroup {
        let mut annotations = std::collections::BTreeMap::new();
        annotations.insert(ANNOTATION_PROVIDED_APIS.to_owned(), provided.to_owned());
        OperatorGroup {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some("og".to_owned()),
                namespace: Some("ns".to_owned()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: OperatorGroupSpec {
                selector: None,
                target_namespaces: None,
                static_provided_apis: false,
            },
            status: Some(OperatorGroupStatus {
                namespaces: namespaces.iter().map(|s| (*s).to_owned()).collect(),
            }),
        }
    }

    #[test]
    fn intersects_on_shared_namespace() {
        let a = og_with(&["ns1", "ns2"], "");
        let b = og_with(&["ns2", "ns3"], "");
        assert!(a.intersects(&b));
    }

    #[test]
    fn all_namespaces_intersects_everything() {
        let a = og_with(&[""], "");
        let b = og_with(&["ns3"], "");
        assert!(a.intersects(&b));
    }

    #[test]
    fn disjoint_groups_do_not_intersect() {
        let a = og_with(&["ns1"], "");
        let b = og_with(&["ns2"], "");
        assert!(!a.intersects(&b));
    }
}
