use std::collections::BTreeMap;
use std::sync::Arc;

use csv_api::certs::CertProvider;
use csv_api::clock::{Clock, SystemClock};
use csv_api::consts::{FIELD_MANAGER, KIND_CLUSTER_SERVICE_VERSION};
use csv_api::csv::{ClusterServiceVersion, CsvPhase, PolicyRule};
use csv_api::error::SyncError;
use csv_api::events::EventRecorder;
use csv_api::installer::{Installer, InstallerError};
use csv_api::operatorcondition::OperatorCondition;
use csv_api::rbac::RBACEnsurer;
use csv_api::store::ObjectStore;
use csv_api::ApiTriple;
use csv_core::requirements::{check_min_kube_version, ApiServiceState, CrdState, PermissionState, RequirementInputs};
use csv_core::world::WorldSnapshot;
use csv_core::{find_owner_conflict, replacement, transition, webhook_conflict, SideEffect, TransitionConfig};
use csv_queue::{NamespacedName, Queues};
use k8s_openapi::api::admissionregistration::v1::{MutatingWebhookConfiguration, ValidatingWebhookConfiguration};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule as K8sPolicyRule, Role, RoleBinding, Subject,
};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::kube_aggregator::pkg::apis::apiregistration::v1::APIService;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tracing::{debug, warn};

/// Everything one `sync_csv` call needs: the store/installer/cert/rbac
/// collaborators, the raw `kube::Client` for the handful of lookups none of
/// those trait boundaries cover (CRD establishment, ServiceAccount
/// presence), and the queues to re-enqueue into per `SideEffect`.
pub struct ReconcileContext {
    pub client: Client,
    pub store: Arc<dyn ObjectStore>,
    pub installer: Arc<dyn Installer>,
    pub cert_provider: Arc<dyn CertProvider>,
    pub rbac: Arc<dyn RBACEnsurer>,
    pub queues: Arc<Queues>,
    pub config: TransitionConfig,
    pub events: Arc<dyn EventRecorder>,
}

/// One pass of the `csv` queue worker: fetch, assemble a `WorldSnapshot`,
/// run the pure transition, persist and act on the result.
pub async fn sync_csv(ctx: &ReconcileContext, key: &NamespacedName) -> csv_api::error::Result<()> {
    let Some(csv) = ctx
        .store
        .get_csv(&key.namespace, &key.name)
        .await
        .map_err(store_err)?
    else {
        debug!(namespace = %key.namespace, name = %key.name, "csv no longer exists");
        return Ok(());
    };
    if csv.is_copy() {
        return Ok(());
    }

    let previous = csv.status.as_ref().map(|s| (s.phase, s.reason));

    let world = build_world(ctx, &csv).await?;
    let clock = SystemClock;
    let output = transition(&csv, &world, &clock, &ctx.config);

    ctx.store.update_csv_status(&output.csv).await.map_err(store_err)?;

    if let Some(status) = &output.csv.status {
        let current = (status.phase, status.reason);
        if previous != Some(current) {
            ctx.events
                .record(&key.namespace, &key.name, status.phase, status.reason, &status.message)
                .await;
        }
    }

    for effect in &output.effects {
        if let Err(e) = apply_effect(ctx, &output.csv, effect).await {
            warn!(namespace = %key.namespace, name = %key.name, error = %e, "side effect failed");
        }
    }

    match output.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn store_err(e: anyhow::Error) -> SyncError {
    SyncError::Store(e.into())
}

async fn build_world(ctx: &ReconcileContext, csv: &ClusterServiceVersion) -> csv_api::error::Result<WorldSnapshot> {
    let (namespace, _name) = csv
        .namespace_name()
        .ok_or_else(|| SyncError::ProgrammerPrecondition("csv missing namespace/name".to_owned()))?;

    let namespace_csvs: BTreeMap<String, ClusterServiceVersion> = ctx
        .store
        .list_csvs(namespace)
        .await
        .map_err(store_err)?
        .into_iter()
        .filter(|c| !c.is_copy())
        .filter_map(|c| c.metadata.name.clone().map(|n| (n, c)))
        .collect();

    let operator_groups = ctx.store.list_operator_groups(namespace).await.map_err(store_err)?;

    // Other-namespace OperatorGroups would need a cluster-scoped list;
    // ObjectStore only exposes a namespaced one. Left empty until that
    // method exists — conflicts against sibling groups in other
    // namespaces are under-detected until then.
    let other_groups = Vec::new();

    let requirements = Some(csv_core::requirements::evaluate(
        &csv.spec.custom_resource_definitions,
        &csv.spec.api_service_definitions,
        &deployment_permissions(csv),
        &gather_requirement_inputs(ctx, csv).await,
    ));

    let (install_outcome, check_installed) = run_installer_step(ctx, csv).await;
    let owner_conflict = find_owner_conflict(csv, &namespace_csvs);
    let webhook_conflict_detected = webhook_conflict(csv, &namespace_csvs);
    let predecessor_not_upgradeable = predecessor_not_upgradeable(ctx, namespace, &namespace_csvs, csv).await;

    Ok(WorldSnapshot {
        namespace_csvs,
        operator_groups,
        other_groups,
        requirements,
        install_outcome,
        check_installed,
        api_service_resources_present: api_service_resources_present(ctx, csv).await,
        webhooks_present: webhooks_present(ctx, csv).await,
        should_rotate_cert: ctx.cert_provider.should_rotate(csv),
        owner_conflict,
        webhook_conflict: webhook_conflict_detected,
        predecessor_not_upgradeable,
    })
}

fn owner_label_selector(namespace: &str, name: &str) -> String {
    format!(
        "{}={name},{}={namespace},{}={KIND_CLUSTER_SERVICE_VERSION}",
        csv_api::consts::LABEL_OWNER_NAME,
        csv_api::consts::LABEL_OWNER_NAMESPACE,
        csv_api::consts::LABEL_OWNER_KIND,
    )
}

/// Confirms this CSV's own owned APIServices are registered and reporting
/// `Available=True`. A CSV that owns none trivially passes.
async fn api_service_resources_present(ctx: &ReconcileContext, csv: &ClusterServiceVersion) -> bool {
    if csv.spec.api_service_definitions.owned.is_empty() {
        return true;
    }
    let api: Api<APIService> = Api::all(ctx.client.clone());
    for triple in &csv.spec.api_service_definitions.owned {
        let name = format!("{}.{}", triple.version, triple.group);
        let Ok(Some(service)) = api.get_opt(&name).await else {
            return false;
        };
        let available = service
            .status
            .and_then(|s| s.conditions)
            .is_some_and(|conditions| conditions.iter().any(|c| c.type_ == "Available" && c.status == "True"));
        if !available {
            return false;
        }
    }
    true
}

/// Confirms a webhook configuration exists for each of this CSV's declared
/// webhook definitions, matched by the owner-label triple the RBAC
/// ensurer and orphan collector also rely on. A CSV with no webhook
/// definitions trivially passes.
async fn webhooks_present(ctx: &ReconcileContext, csv: &ClusterServiceVersion) -> bool {
    if csv.spec.webhook_definitions.is_empty() {
        return true;
    }
    let Some((namespace, name)) = csv.namespace_name() else {
        return false;
    };
    let params = kube::api::ListParams::default().labels(&owner_label_selector(namespace, name));
    let validating_api: Api<ValidatingWebhookConfiguration> = Api::all(ctx.client.clone());
    let mutating_api: Api<MutatingWebhookConfiguration> = Api::all(ctx.client.clone());
    let (validating, mutating) = tokio::join!(validating_api.list(&params), mutating_api.list(&params));

    let present: std::collections::BTreeSet<String> = validating
        .map(|list| list.items)
        .unwrap_or_default()
        .into_iter()
        .chain(mutating.map(|list| list.items).unwrap_or_default())
        .filter_map(|c| c.metadata.name)
        .collect();

    csv.spec.webhook_definitions.iter().all(|w| present.contains(&w.generate_name))
}

/// Looks up the direct predecessor in the replacement chain and reads its
/// `OperatorCondition` (named after it) to see whether it has announced
/// itself not upgradeable, per spec.md's Pending-phase replacement gate.
async fn predecessor_not_upgradeable(
    ctx: &ReconcileContext,
    namespace: &str,
    namespace_csvs: &BTreeMap<String, ClusterServiceVersion>,
    csv: &ClusterServiceVersion,
) -> bool {
    let Some(predecessor_name) = replacement::direct_predecessor(namespace_csvs, csv).and_then(|p| p.metadata.name.clone())
    else {
        return false;
    };
    let api: Api<OperatorCondition> = Api::namespaced(ctx.client.clone(), namespace);
    match api.get_opt(&predecessor_name).await {
        Ok(Some(condition)) => !condition.is_upgradeable(),
        _ => false,
    }
}

fn deployment_permissions(csv: &ClusterServiceVersion) -> Vec<csv_api::csv::PermissionDescriptor> {
    match &csv.spec.install_strategy {
        csv_api::csv::InstallStrategy::Deployment(strategy) => strategy
            .permissions
            .iter()
            .chain(strategy.cluster_permissions.iter())
            .cloned()
            .collect(),
        csv_api::csv::InstallStrategy::Unknown(_) => Vec::new(),
    }
}

/// Only the `InstallReady`/`Installing` phases need an `Installer` call
/// this tick; every other phase leaves both outcomes unset.
async fn run_installer_step(
    ctx: &ReconcileContext,
    csv: &ClusterServiceVersion,
) -> (
    Option<Result<(), InstallerError>>,
    Option<Result<bool, InstallerError>>,
) {
    let phase = csv.status.as_ref().map(|s| s.phase).unwrap_or_default();
    match phase {
        CsvPhase::InstallReady => {
            let outcome = ctx.installer.install(&csv.spec.install_strategy).await;
            (Some(outcome), None)
        }
        CsvPhase::Installing => {
            let outcome = ctx.installer.check_installed(&csv.spec.install_strategy).await;
            (None, Some(outcome))
        }
        _ => (None, None),
    }
}

async fn gather_requirement_inputs(ctx: &ReconcileContext, csv: &ClusterServiceVersion) -> RequirementInputs {
    let crd_api: Api<CustomResourceDefinition> = Api::all(ctx.client.clone());
    let crds = match crd_api.list(&kube::api::ListParams::default()).await {
        Ok(list) => list.items,
        Err(e) => {
            warn!(error = %e, "listing CRDs for requirement check");
            Vec::new()
        }
    };

    let mut crd_states = Vec::new();
    for triple in csv
        .spec
        .custom_resource_definitions
        .owned
        .iter()
        .chain(csv.spec.custom_resource_definitions.required.iter())
    {
        crd_states.push(crd_state_for(triple, &crds));
    }

    let mut permission_states = Vec::new();
    for descriptor in deployment_permissions(csv) {
        permission_states.push(permission_state_for(ctx, csv, &descriptor).await);
    }

    let mut api_service_states = Vec::new();
    for triple in csv
        .spec
        .api_service_definitions
        .owned
        .iter()
        .chain(csv.spec.api_service_definitions.required.iter())
    {
        api_service_states.push(api_service_state_for(ctx, triple).await);
    }

    let (min_kube_version_satisfied, min_kube_version_message) = match ctx.client.apiserver_version().await {
        Ok(info) => check_min_kube_version(csv.spec.min_kube_version.as_deref(), &info.major, &info.minor),
        Err(e) => {
            warn!(error = %e, "discovering server version for minKubeVersion check");
            (None, None)
        }
    };

    RequirementInputs {
        crds: crd_states,
        api_services: api_service_states,
        permissions: permission_states,
        min_kube_version_satisfied,
        min_kube_version_message,
    }
}

fn crd_state_for(triple: &ApiTriple, crds: &[CustomResourceDefinition]) -> CrdState {
    let found = crds.iter().find(|crd| {
        crd.spec.group == triple.group && crd.spec.names.kind == triple.kind
    });
    match found {
        None => CrdState {
            triple: triple.clone(),
            exists: false,
            version_served: false,
            established: false,
            names_accepted: false,
        },
        Some(crd) => {
            let version_served = crd.spec.versions.iter().any(|v| v.name == triple.version && v.served);
            let conditions = crd.status.as_ref().and_then(|s| s.conditions.clone()).unwrap_or_default();
            let established = conditions.iter().any(|c| c.type_ == "Established" && c.status == "True");
            let names_accepted = conditions.iter().any(|c| c.type_ == "NamesAccepted" && c.status == "True");
            CrdState {
                triple: triple.clone(),
                exists: true,
                version_served,
                established,
                names_accepted,
            }
        }
    }
}

async fn api_service_state_for(ctx: &ReconcileContext, triple: &ApiTriple) -> ApiServiceState {
    let api: Api<APIService> = Api::all(ctx.client.clone());
    let name = format!("{}.{}", triple.version, triple.group);
    match api.get_opt(&name).await {
        Ok(Some(service)) => {
            let available = service
                .status
                .and_then(|s| s.conditions)
                .is_some_and(|conditions| conditions.iter().any(|c| c.type_ == "Available" && c.status == "True"));
            ApiServiceState {
                triple: triple.clone(),
                present: true,
                available,
            }
        }
        _ => ApiServiceState {
            triple: triple.clone(),
            present: false,
            available: false,
        },
    }
}

/// Per spec: a service account is *owned* when an owner reference names
/// kind `ClusterServiceVersion` with a matching UID; a non-CSV owner or no
/// owner at all is acceptable. A different CSV's UID is a conflict.
async fn permission_state_for(
    ctx: &ReconcileContext,
    csv: &ClusterServiceVersion,
    descriptor: &csv_api::csv::PermissionDescriptor,
) -> PermissionState {
    let namespace = csv.namespace_name().map(|(ns, _)| ns).unwrap_or_default();
    let sa_api: Api<ServiceAccount> = Api::namespaced(ctx.client.clone(), namespace);
    let sa = sa_api.get_opt(&descriptor.service_account_name).await.ok().flatten();
    let service_account_exists = sa.is_some();
    let owned_by_other_csv = sa
        .as_ref()
        .and_then(|sa| sa.metadata.owner_references.as_ref())
        .is_some_and(|refs| {
            refs.iter()
                .any(|r| r.kind == KIND_CLUSTER_SERVICE_VERSION && Some(&r.uid) != csv.metadata.uid.as_ref())
        });

    let (namespaced_rules, cluster_rules) =
        matching_role_rules(ctx, namespace, &descriptor.service_account_name).await;
    let rule_satisfied = descriptor
        .rules
        .iter()
        .map(|rule| {
            let granted = if rule.is_cluster_scoped() { &cluster_rules } else { &namespaced_rules };
            rule_covered(rule, granted)
        })
        .collect();

    PermissionState {
        service_account_name: descriptor.service_account_name.clone(),
        service_account_exists,
        owned_by_other_csv,
        rule_satisfied,
    }
}

/// Looks up the deterministically-named Role/RoleBinding and ClusterRole/
/// ClusterRoleBinding pair `KubeRbacEnsurer` provisions for a service
/// account, returning the granted rules only once the binding actually
/// subjects that service account.
async fn matching_role_rules(
    ctx: &ReconcileContext,
    namespace: &str,
    service_account_name: &str,
) -> (Vec<K8sPolicyRule>, Vec<K8sPolicyRule>) {
    let role_api: Api<Role> = Api::namespaced(ctx.client.clone(), namespace);
    let binding_api: Api<RoleBinding> = Api::namespaced(ctx.client.clone(), namespace);
    let cluster_role_api: Api<ClusterRole> = Api::all(ctx.client.clone());
    let cluster_binding_api: Api<ClusterRoleBinding> = Api::all(ctx.client.clone());

    let (role, binding, cluster_role, cluster_binding) = tokio::join!(
        role_api.get_opt(&format!("{service_account_name}-role")),
        binding_api.get_opt(&format!("{service_account_name}-binding")),
        cluster_role_api.get_opt(&format!("{service_account_name}-clusterrole")),
        cluster_binding_api.get_opt(&format!("{service_account_name}-clusterbinding")),
    );

    let namespaced_bound = binding.ok().flatten().is_some_and(|b| binds_subject(&b.subjects, service_account_name));
    let cluster_bound = cluster_binding
        .ok()
        .flatten()
        .is_some_and(|b| binds_subject(&b.subjects, service_account_name));

    let namespaced = if namespaced_bound {
        role.ok().flatten().and_then(|r| r.rules).unwrap_or_default()
    } else {
        Vec::new()
    };
    let cluster = if cluster_bound {
        cluster_role.ok().flatten().and_then(|r| r.rules).unwrap_or_default()
    } else {
        Vec::new()
    };
    (namespaced, cluster)
}

fn binds_subject(subjects: &Option<Vec<Subject>>, service_account_name: &str) -> bool {
    subjects
        .as_ref()
        .is_some_and(|subs| subs.iter().any(|s| s.kind == "ServiceAccount" && s.name == service_account_name))
}

fn rule_covered(rule: &PolicyRule, granted: &[K8sPolicyRule]) -> bool {
    granted.iter().any(|g| {
        let groups = g.api_groups.as_deref().unwrap_or_default();
        let resources = g.resources.as_deref().unwrap_or_default();
        rule.api_groups.iter().all(|grp| groups.contains(grp))
            && rule.resources.iter().all(|res| resources.contains(res))
            && rule.verbs.iter().all(|v| g.verbs.contains(v))
    })
}

async fn apply_effect(
    ctx: &ReconcileContext,
    csv: &ClusterServiceVersion,
    effect: &SideEffect,
) -> anyhow::Result<()> {
    match effect {
        SideEffect::UpdateOperatorGroupProvidedApis {
            group_namespace,
            group_name,
            provided_apis,
        } => {
            let groups = ctx.store.list_operator_groups(group_namespace).await?;
            if let Some(mut group) = groups.into_iter().find(|g| g.metadata.name.as_deref() == Some(group_name)) {
                group
                    .metadata
                    .annotations
                    .get_or_insert_with(Default::default)
                    .insert(csv_api::consts::ANNOTATION_PROVIDED_APIS.to_owned(), provided_apis.to_annotation());
                ctx.store.update_operator_group(&group).await?;
            }
            Ok(())
        }
        SideEffect::TearDownDeployments => {
            if let csv_api::csv::InstallStrategy::Deployment(strategy) = &csv.spec.install_strategy {
                let namespace = csv.namespace_name().map(|(ns, _)| ns).unwrap_or_default();
                let api: Api<k8s_openapi::api::apps::v1::Deployment> = Api::namespaced(ctx.client.clone(), namespace);
                for descriptor in &strategy.deployment_specs {
                    let _ = api.delete(&descriptor.name, &kube::api::DeleteParams::default()).await;
                }
            }
            Ok(())
        }
        SideEffect::RequeueSelf => {
            if let Some((namespace, name)) = csv.namespace_name() {
                ctx.queues.csv.add(NamespacedName::new(namespace, name));
            }
            Ok(())
        }
        SideEffect::RequeueNamed(name) => {
            if let Some((namespace, _)) = csv.namespace_name() {
                ctx.queues.csv.add(NamespacedName::new(namespace, name));
            }
            Ok(())
        }
        SideEffect::DeleteSelf => {
            if let Some((namespace, name)) = csv.namespace_name() {
                ctx.store.delete_csv(namespace, name, Some(0)).await?;
            }
            Ok(())
        }
        SideEffect::IssueCertRotation => {
            let _bundle = ctx.cert_provider.issue(csv).await?;
            // Persisting the bundle into a Secret is the installer's job
            // once webhook/APIService provisioning is implemented; for now
            // `transition` already stamps certsLastUpdated/certsRotateAt
            // onto status from this effect firing.
            Ok(())
        }
        SideEffect::EnsureClusterRoles(surface) => {
            let Some((namespace, name)) = csv.namespace_name() else { return Ok(()) };
            ctx.rbac.ensure_provided_api_cluster_roles(namespace, name, surface).await
        }
    }
}

/// Applies server-side-apply writes for a freshly-resolved `csv` CRD/
/// OperatorGroup CRD definition. Exposed so `main.rs`'s CRD bootstrap can
/// share the field manager constant with every other writer.
pub async fn patch_crd(client: &Client, crd: &CustomResourceDefinition) -> anyhow::Result<()> {
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let name = crd.metadata.name.clone().unwrap_or_default();
    api.patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(crd)).await?;
    Ok(())
}
