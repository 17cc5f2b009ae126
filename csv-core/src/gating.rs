//! Pure Pending-phase gating predicates from spec.md §4.1 that need no
//! I/O beyond the same-namespace CSV snapshot already gathered into
//! `WorldSnapshot::namespace_csvs`: CRD/APIService owner conflicts and
//! webhook name/rule validity.

use std::collections::{BTreeMap, BTreeSet};

use csv_api::csv::{ClusterServiceVersion, WebhookDescriptor};

use crate::replacement::chain;
use crate::world::OwnerConflict;

/// Another same-namespace CSV, outside this one's replacement chain, that
/// already declares one of our owned CRDs or owned APIServices as its own.
#[must_use]
pub fn find_owner_conflict(
    focal: &ClusterServiceVersion,
    namespace_csvs: &BTreeMap<String, ClusterServiceVersion>,
) -> Option<OwnerConflict> {
    let focal_name = focal.metadata.name.clone()?;
    let our_chain = chain(namespace_csvs, &focal_name);
    let our_crds = focal.spec.custom_resource_definitions.owned_surface();
    let our_api_services = focal.spec.api_service_definitions.owned_surface();

    for (name, other) in namespace_csvs {
        if our_chain.contains(name) {
            continue;
        }
        if !our_crds.intersection(&other.spec.custom_resource_definitions.owned_surface()).is_empty() {
            return Some(OwnerConflict { owner_csv_name: name.clone(), is_api_service: false });
        }
        if !our_api_services.intersection(&other.spec.api_service_definitions.owned_surface()).is_empty() {
            return Some(OwnerConflict { owner_csv_name: name.clone(), is_api_service: true });
        }
    }
    None
}

/// Whether this CSV's webhooks are internally invalid (duplicate names or
/// structurally incomplete rules) or collide by name with another
/// same-namespace CSV's declared webhooks.
#[must_use]
pub fn webhook_conflict(
    focal: &ClusterServiceVersion,
    namespace_csvs: &BTreeMap<String, ClusterServiceVersion>,
) -> bool {
    let webhooks = &focal.spec.webhook_definitions;
    if has_duplicate_names(webhooks) || webhooks.iter().any(|w| !webhook_is_valid(w)) {
        return true;
    }
    let Some(focal_name) = focal.metadata.name.as_deref() else { return false };
    for (name, other) in namespace_csvs {
        if name == focal_name {
            continue;
        }
        if webhooks
            .iter()
            .any(|ours| other.spec.webhook_definitions.iter().any(|theirs| theirs.generate_name == ours.generate_name))
        {
            return true;
        }
    }
    false
}

fn has_duplicate_names(webhooks: &[WebhookDescriptor]) -> bool {
    let mut seen = BTreeSet::new();
    webhooks.iter().any(|w| !seen.insert(w.generate_name.clone()))
}

fn webhook_is_valid(webhook: &WebhookDescriptor) -> bool {
    !webhook.generate_name.is_empty()
        && webhook.rules.iter().all(|rule| {
            !rule.api_groups.is_empty()
                && !rule.api_versions.is_empty()
                && !rule.resources.is_empty()
                && !rule.operations.is_empty()
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use csv_api::csv::{ApiSurfaceSpec, CsvSpec, CsvStatus, DeploymentStrategy, InstallStrategy, WebhookRule, WebhookType};
    use csv_api::ApiTriple;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn csv(name: &str, owned_crds: Vec<ApiTriple>, webhooks: Vec<WebhookDescriptor>) -> ClusterServiceVersion {
        ClusterServiceVersion {
            metadata: ObjectMeta { name: Some(name.to_owned()), namespace: Some("ns".to_owned()), ..Default::default() },
            spec: CsvSpec {
                install_strategy: InstallStrategy::Deployment(DeploymentStrategy::default()),
                install_modes: vec![],
                custom_resource_definitions: ApiSurfaceSpec { owned: owned_crds, required: vec![] },
                api_service_definitions: ApiSurfaceSpec::default(),
                webhook_definitions: webhooks,
                replaces: None,
                min_kube_version: None,
            },
            status: Some(CsvStatus::default()),
        }
    }

    fn by_name(csvs: Vec<ClusterServiceVersion>) -> BTreeMap<String, ClusterServiceVersion> {
        csvs.into_iter().map(|c| (c.metadata.name.clone().unwrap(), c)).collect()
    }

    fn valid_webhook(name: &str) -> WebhookDescriptor {
        WebhookDescriptor {
            generate_name: name.to_owned(),
            webhook_type: WebhookType::ValidatingAdmissionWebhook,
            rules: vec![WebhookRule {
                api_groups: vec!["example.com".to_owned()],
                api_versions: vec!["v1".to_owned()],
                resources: vec!["widgets".to_owned()],
                operations: vec!["CREATE".to_owned()],
            }],
        }
    }

    #[test]
    fn unrelated_csvs_owning_same_crd_conflict() {
        let triple = ApiTriple::new("example.com", "v1", "Widget");
        let a = csv("csv1", vec![triple.clone()], vec![]);
        let b = csv("csv2", vec![triple], vec![]);
        let world = by_name(vec![a, b.clone()]);
        let conflict = find_owner_conflict(&b, &world).unwrap();
        assert_eq!(conflict.owner_csv_name, "csv1");
        assert!(!conflict.is_api_service);
    }

    #[test]
    fn chain_members_do_not_conflict_over_owned_crds() {
        let triple = ApiTriple::new("example.com", "v1", "Widget");
        let mut v2 = csv("v2", vec![triple.clone()], vec![]);
        v2.spec.replaces = Some("v1".to_owned());
        let v1 = csv("v1", vec![triple], vec![]);
        let world = by_name(vec![v1, v2.clone()]);
        assert!(find_owner_conflict(&v2, &world).is_none());
    }

    #[test]
    fn duplicate_webhook_names_within_one_csv_conflict() {
        let c = csv("csv1", vec![], vec![valid_webhook("hook"), valid_webhook("hook")]);
        let world = by_name(vec![c.clone()]);
        assert!(webhook_conflict(&c, &world));
    }

    #[test]
    fn incomplete_rule_is_invalid() {
        let mut webhook = valid_webhook("hook");
        webhook.rules[0].resources.clear();
        let c = csv("csv1", vec![], vec![webhook]);
        let world = by_name(vec![c.clone()]);
        assert!(webhook_conflict(&c, &world));
    }

    #[test]
    fn cross_csv_name_collision_conflicts() {
        let a = csv("csv1", vec![], vec![valid_webhook("hook")]);
        let b = csv("csv2", vec![], vec![valid_webhook("hook")]);
        let world = by_name(vec![a, b.clone()]);
        assert!(webhook_conflict(&b, &world));
    }

    #[test]
    fn no_conflict_when_names_and_owners_distinct() {
        let a = csv("csv1", vec![ApiTriple::new("example.com", "v1", "Widget")], vec![valid_webhook("hook-a")]);
        let b = csv("csv2", vec![ApiTriple::new("example.com", "v1", "Gadget")], vec![valid_webhook("hook-b")]);
        let world = by_name(vec![a, b.clone()]);
        assert!(find_owner_conflict(&b, &world).is_none());
        assert!(!webhook_conflict(&b, &world));
    }
}
