use std::collections::{BTreeMap, BTreeSet};

use csv_api::ClusterServiceVersion;

/// L3 — Replacement Index.
///
/// Given a map of same-namespace CSVs keyed by name, computes the set of
/// names reachable from a focal CSV by walking `spec.replaces` in both
/// directions. Never persisted: recomputed from the lister snapshot on
/// every call, per spec.md §9's "don't model pointers" design note.
pub fn chain(csvs_by_name: &BTreeMap<String, ClusterServiceVersion>, start: &str) -> BTreeSet<String> {
    let mut visited = BTreeSet::new();
    visited.insert(start.to_owned());

    // Forward: who replaces `current`?
    let mut current = start.to_owned();
    loop {
        match direct_successor(csvs_by_name, &current) {
            Some(next) => {
                let Some(name) = next.metadata.name.clone() else { break };
                if !visited.insert(name.clone()) {
                    break; // cycle
                }
                current = name;
            }
            None => break,
        }
    }

    // Backward: what does `current` replace?
    let mut current = start.to_owned();
    loop {
        let Some(csv) = csvs_by_name.get(&current) else { break };
        match csv.spec.replaces.as_ref() {
            Some(predecessor) => {
                if !visited.insert(predecessor.clone()) {
                    break; // cycle
                }
                current = predecessor.clone();
            }
            None => break,
        }
    }

    visited
}

/// The CSV whose `spec.replaces` names `name`, if any. Linear scan over
/// same-namespace CSVs, as specified ("the successor search is linear").
#[must_use]
pub fn direct_successor<'a>(
    csvs_by_name: &'a BTreeMap<String, ClusterServiceVersion>,
    name: &str,
) -> Option<&'a ClusterServiceVersion> {
    csvs_by_name
        .values()
        .filter(|csv| csv.spec.replaces.as_deref() == Some(name))
        .min_by_key(|csv| csv.metadata.name.clone())
}

/// The CSV this one replaces, looked up in the snapshot; `None` both when
/// `spec.replaces` is unset and when the predecessor is already gone.
#[must_use]
pub fn direct_predecessor<'a>(
    csvs_by_name: &'a BTreeMap<String, ClusterServiceVersion>,
    csv: &ClusterServiceVersion,
) -> Option<&'a ClusterServiceVersion> {
    csv.spec
        .replaces
        .as_ref()
        .and_then(|name| csvs_by_name.get(name))
}

/// Whether `csv` is the earliest (root) node of its replacement chain: it
/// has no predecessor, or its predecessor has already been removed from
/// the snapshot. Only the earliest node is allowed to proceed past
/// `Replacing` toward garbage collection (spec.md §4.1).
#[must_use]
pub fn is_earliest(csvs_by_name: &BTreeMap<String, ClusterServiceVersion>, csv: &ClusterServiceVersion) -> bool {
    direct_predecessor(csvs_by_name, csv).is_none()
}

#[cfg(test)]
mod test {
    use super::*;
    use csv_api::csv::{ApiSurfaceSpec, CsvSpec, CsvStatus, DeploymentStrategy, InstallStrategy};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn csv(name: &str, replaces: Option<&str>) -> ClusterServiceVersion {
        ClusterServiceVersion {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("ns".to_owned()),
                ..Default::default()
            },
            spec: CsvSpec {
                install_strategy: InstallStrategy::Deployment(DeploymentStrategy::default()),
                install_modes: vec![],
                custom_resource_definitions: ApiSurfaceSpec::default(),
                api_service_definitions: ApiSurfaceSpec::default(),
                webhook_definitions: vec![],
                replaces: replaces.map(ToOwned::to_owned),
                min_kube_version: None,
            },
            status: Some(CsvStatus::default()),
        }
    }

    fn by_name(csvs: Vec<ClusterServiceVersion>) -> BTreeMap<String, ClusterServiceVersion> {
        csvs.into_iter()
            .map(|c| (c.metadata.name.clone().unwrap(), c))
            .collect()
    }

    #[test]
    fn chain_walks_forward_and_backward() {
        let csvs = by_name(vec![
            csv("v1", None),
            csv("v2", Some("v1")),
            csv("v3", Some("v2")),
        ]);
        let found = chain(&csvs, "v2");
        assert_eq!(found, ["v1", "v2", "v3"].into_iter().map(String::from).collect());
    }

    #[test]
    fn chain_terminates_on_cycle() {
        let csvs = by_name(vec![csv("a", Some("b")), csv("b", Some("a"))]);
        let found = chain(&csvs, "a");
        assert!(found.len() <= csvs.len());
        assert!(found.contains("a"));
        assert!(found.contains("b"));
    }

    #[test]
    fn direct_successor_finds_replacer() {
        let csvs = by_name(vec![csv("v1", None), csv("v2", Some("v1"))]);
        let successor = direct_successor(&csvs, "v1").unwrap();
        assert_eq!(successor.metadata.name.as_deref(), Some("v2"));
        assert!(direct_successor(&csvs, "v2").is_none());
    }

    #[test]
    fn earliest_node_has_no_live_predecessor() {
        let csvs = by_name(vec![csv("v1", None), csv("v2", Some("v1"))]);
        assert!(is_earliest(&csvs, csvs.get("v1").unwrap()));
        assert!(!is_earliest(&csvs, csvs.get("v2").unwrap()));

        // once v1 is gone, v2 becomes earliest
        let csvs_after_gc = by_name(vec![csv("v2", Some("v1"))]);
        assert!(is_earliest(&csvs_after_gc, csvs_after_gc.get("v2").unwrap()));
    }
}
