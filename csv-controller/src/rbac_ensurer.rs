use std::collections::BTreeMap;

use async_trait::async_trait;
use csv_api::apisurface::ApiSurface;
use csv_api::consts::{
    FIELD_MANAGER, KIND_CLUSTER_SERVICE_VERSION, LABEL_OWNER_KIND, LABEL_OWNER_NAME, LABEL_OWNER_NAMESPACE,
};
use csv_api::csv::PermissionDescriptor;
use csv_api::rbac::RBACEnsurer;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule as K8sPolicyRule, Role, RoleBinding, RoleRef, Subject,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};

/// The three aggregated role suffixes OLM conventionally creates per
/// provided API, each widening the verb set of the last.
const VIEW_VERBS: &[&str] = &["get", "list", "watch"];
const EDIT_VERBS: &[&str] = &["get", "list", "watch", "create", "update", "patch", "delete"];
const ADMIN_VERBS: &[&str] = &["get", "list", "watch", "create", "update", "patch", "delete", "deletecollection"];

/// Applies the ServiceAccount plus a Role/RoleBinding (or ClusterRole/
/// ClusterRoleBinding for non-resource-URL rules) for each declared
/// permission, via the same server-side-apply pattern used everywhere
/// else in this controller.
pub struct KubeRbacEnsurer {
    client: Client,
}

impl KubeRbacEnsurer {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn policy_rules(descriptor: &PermissionDescriptor) -> Vec<K8sPolicyRule> {
        descriptor
            .rules
            .iter()
            .map(|r| K8sPolicyRule {
                api_groups: Some(r.api_groups.clone()),
                resources: Some(r.resources.clone()),
                verbs: r.verbs.clone(),
                non_resource_ur_ls: Some(r.non_resource_urls.clone()),
                ..Default::default()
            })
            .collect()
    }

    async fn ensure_service_account(&self, namespace: &str, name: &str) -> anyhow::Result<()> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        let sa = ServiceAccount {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&sa)).await?;
        Ok(())
    }
}

#[async_trait]
impl RBACEnsurer for KubeRbacEnsurer {
    async fn ensure_namespaced(&self, namespace: &str, permissions: &[PermissionDescriptor]) -> anyhow::Result<()> {
        for descriptor in permissions {
            self.ensure_service_account(namespace, &descriptor.service_account_name).await?;

            let role_name = format!("{}-role", descriptor.service_account_name);
            let role = Role {
                metadata: ObjectMeta {
                    name: Some(role_name.clone()),
                    namespace: Some(namespace.to_owned()),
                    ..Default::default()
                },
                rules: Some(Self::policy_rules(descriptor)),
            };
            let role_api: Api<Role> = Api::namespaced(self.client.clone(), namespace);
            role_api
                .patch(&role_name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&role))
                .await?;

            let binding_name = format!("{}-binding", descriptor.service_account_name);
            let binding = RoleBinding {
                metadata: ObjectMeta {
                    name: Some(binding_name.clone()),
                    namespace: Some(namespace.to_owned()),
                    ..Default::default()
                },
                role_ref: RoleRef {
                    api_group: "rbac.authorization.k8s.io".to_owned(),
                    kind: "Role".to_owned(),
                    name: role_name,
                },
                subjects: Some(vec![Subject {
                    kind: "ServiceAccount".to_owned(),
                    name: descriptor.service_account_name.clone(),
                    namespace: Some(namespace.to_owned()),
                    ..Default::default()
                }]),
            };
            let binding_api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
            binding_api
                .patch(&binding_name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&binding))
                .await?;
        }
        Ok(())
    }

    async fn ensure_cluster_scoped(&self, namespace: &str, permissions: &[PermissionDescriptor]) -> anyhow::Result<()> {
        for descriptor in permissions {
            self.ensure_service_account(namespace, &descriptor.service_account_name).await?;

            let role_name = format!("{}-clusterrole", descriptor.service_account_name);
            let role = ClusterRole {
                metadata: ObjectMeta {
                    name: Some(role_name.clone()),
                    ..Default::default()
                },
                rules: Some(Self::policy_rules(descriptor)),
                ..Default::default()
            };
            let role_api: Api<ClusterRole> = Api::all(self.client.clone());
            role_api
                .patch(&role_name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&role))
                .await?;

            let binding_name = format!("{}-clusterbinding", descriptor.service_account_name);
            let binding = ClusterRoleBinding {
                metadata: ObjectMeta {
                    name: Some(binding_name.clone()),
                    ..Default::default()
                },
                role_ref: RoleRef {
                    api_group: "rbac.authorization.k8s.io".to_owned(),
                    kind: "ClusterRole".to_owned(),
                    name: role_name,
                },
                subjects: Some(vec![Subject {
                    kind: "ServiceAccount".to_owned(),
                    name: descriptor.service_account_name.clone(),
                    namespace: Some(namespace.to_owned()),
                    ..Default::default()
                }]),
            };
            let binding_api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
            binding_api
                .patch(&binding_name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&binding))
                .await?;
        }
        Ok(())
    }

    async fn ensure_provided_api_cluster_roles(
        &self,
        csv_namespace: &str,
        csv_name: &str,
        provided: &ApiSurface,
    ) -> anyhow::Result<()> {
        let role_api: Api<ClusterRole> = Api::all(self.client.clone());
        for triple in provided.iter() {
            for (suffix, verbs) in [("view", VIEW_VERBS), ("edit", EDIT_VERBS), ("admin", ADMIN_VERBS)] {
                let resource = if triple.plural.is_empty() {
                    format!("{}s", triple.kind.to_lowercase())
                } else {
                    triple.plural.clone()
                };
                let role_name = format!("{resource}.{}-{}-{suffix}", triple.group, triple.version);
                let role = ClusterRole {
                    metadata: ObjectMeta {
                        name: Some(role_name.clone()),
                        labels: Some(owner_labels(csv_namespace, csv_name)),
                        ..Default::default()
                    },
                    rules: Some(vec![K8sPolicyRule {
                        api_groups: Some(vec![triple.group.clone()]),
                        resources: Some(vec![resource]),
                        verbs: verbs.iter().map(|v| (*v).to_owned()).collect(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                };
                role_api
                    .patch(&role_name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&role))
                    .await?;
            }
        }
        Ok(())
    }
}

fn owner_labels(csv_namespace: &str, csv_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_OWNER_NAME.to_owned(), csv_name.to_owned()),
        (LABEL_OWNER_NAMESPACE.to_owned(), csv_namespace.to_owned()),
        (LABEL_OWNER_KIND.to_owned(), KIND_CLUSTER_SERVICE_VERSION.to_owned()),
    ])
}

#[cfg(test)]
mod test {
    use csv_api::csv::PolicyRule;

    use super::*;

    #[test]
    fn policy_rules_translate_verbs_and_resources() {
        let descriptor = PermissionDescriptor {
            service_account_name: "sa".to_owned(),
            rules: vec![PolicyRule {
                api_groups: vec!["example.com".to_owned()],
                resources: vec!["widgets".to_owned()],
                verbs: vec!["get".to_owned(), "list".to_owned()],
                non_resource_urls: vec![],
            }],
        };
        let rules = KubeRbacEnsurer::policy_rules(&descriptor);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].verbs, vec!["get".to_owned(), "list".to_owned()]);
    }
}
