//! L11 — Event fan-out wiring: turns `kube::runtime::watcher` streams into
//! `csv_queue::fanout::route` calls against the shared `Queues`. Each
//! watched kind gets its own task, mirroring the teacher's one-goroutine
//! (here, one-task) per informer shape.

use std::sync::Arc;

use csv_api::consts::{LABEL_OWNER_KIND, LABEL_OWNER_NAME, LABEL_OWNER_NAMESPACE};
use csv_api::csv::ClusterServiceVersion;
use csv_api::operatorgroup::OperatorGroup;
use csv_api::store::ObjectStore;
use csv_api::ApiTriple;
use csv_queue::fanout::{route, NamespacedName, Route, WatchedObject, CLUSTER_SCOPED_OWNED_KINDS};
use csv_queue::Queues;
use futures::StreamExt;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::watcher::{self, Event};
use kube::{Api, Client, Resource};
use tracing::warn;

fn apply_routes(queues: &Queues, routes: Vec<Route>) {
    for r in routes {
        match r {
            Route::Csv(key) => queues.csv.add(key),
            Route::CsvCopy(key) => queues.csv_copy.add(key),
            Route::CsvGc(key) => queues.csv_gc.add(key),
            Route::Og(key) => queues.og.add(key),
            Route::ObjGc { kind, name } => queues.obj_gc.add(format!("{kind}/{name}")),
        }
    }
}

fn for_each_applied<K, F>(event: Event<K>, mut f: F)
where
    F: FnMut(K),
{
    match event {
        Event::Applied(obj) => f(obj),
        Event::Restarted(objs) => objs.into_iter().for_each(f),
        Event::Deleted(obj) => f(obj),
    }
}

fn namespace_scoped<K: Resource<Scope = k8s_openapi::NamespaceResourceScope>>(
    client: &Client,
    cluster_wide: bool,
    namespace: &str,
) -> Api<K> {
    if cluster_wide {
        Api::all(client.clone())
    } else {
        Api::namespaced(client.clone(), namespace)
    }
}

/// Watches `ClusterServiceVersion` mutations and routes them to `csv` or
/// `csv-gc` depending on whether the object is a copy.
pub async fn watch_csv(client: Client, queues: Arc<Queues>, cluster_wide: bool, namespace: String) {
    let api: Api<ClusterServiceVersion> = namespace_scoped(&client, cluster_wide, &namespace);
    let mut stream = watcher::watcher(api, watcher::Config::default()).boxed();
    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => for_each_applied(event, |csv: ClusterServiceVersion| {
                let Some((ns, name)) = csv.namespace_name() else { return };
                let key = NamespacedName::new(ns, name);
                let object = WatchedObject::Csv { key, is_copy: csv.is_copy() };
                apply_routes(&queues, route(&object));
            }),
            Err(e) => warn!(error = %e, "csv watch stream error"),
        }
    }
}

/// Watches `OperatorGroup` mutations and routes them to `og`.
pub async fn watch_operator_group(client: Client, queues: Arc<Queues>, cluster_wide: bool, namespace: String) {
    let api: Api<OperatorGroup> = namespace_scoped(&client, cluster_wide, &namespace);
    let mut stream = watcher::watcher(api, watcher::Config::default()).boxed();
    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => for_each_applied(event, |og: OperatorGroup| {
                let (Some(ns), Some(name)) = (og.metadata.namespace.clone(), og.metadata.name.clone()) else {
                    return;
                };
                let object = WatchedObject::OperatorGroup { key: NamespacedName::new(ns, name) };
                apply_routes(&queues, route(&object));
            }),
            Err(e) => warn!(error = %e, "operatorgroup watch stream error"),
        }
    }
}

/// Watches `Namespace` mutations and fans each one out to every
/// OperatorGroup whose resolved `status.namespaces` already contains it.
pub async fn watch_namespace(client: Client, queues: Arc<Queues>, store: Arc<dyn ObjectStore>) {
    let api: Api<Namespace> = Api::all(client);
    let mut stream = watcher::watcher(api, watcher::Config::default()).boxed();
    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => {
                let mut names = Vec::new();
                for_each_applied(event, |ns: Namespace| {
                    if let Some(name) = ns.metadata.name {
                        names.push(name);
                    }
                });
                for name in names {
                    let members = crate::workers::member_groups_of(&store, &name).await.unwrap_or_default();
                    let member_of: Vec<NamespacedName> = members;
                    let object = WatchedObject::Namespace { member_of: &member_of };
                    apply_routes(&queues, route(&object));
                }
            }
            Err(e) => warn!(error = %e, "namespace watch stream error"),
        }
    }
}

/// Watches `CustomResourceDefinition` mutations and fans each one out to
/// every CSV whose `olm.api.<hash>` labels name this CRD's served
/// `(group, version, kind)` triples.
pub async fn watch_crd(client: Client, queues: Arc<Queues>) {
    let crd_api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let csv_api: Api<ClusterServiceVersion> = Api::all(client);
    let mut stream = watcher::watcher(crd_api, watcher::Config::default()).boxed();
    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => for_each_applied(event, |crd: CustomResourceDefinition| {
                let csv_api = csv_api.clone();
                let queues = Arc::clone(&queues);
                tokio::spawn(async move {
                    let mut matching = Vec::new();
                    for version in &crd.spec.versions {
                        let triple = ApiTriple::new(crd.spec.group.clone(), version.name.clone(), crd.spec.names.kind.clone());
                        let label = format!("{}{}", csv_api::consts::API_LABEL_PREFIX, triple.label_hash());
                        let params = kube::api::ListParams::default().labels(&label);
                        match csv_api.list(&params).await {
                            Ok(list) => matching.extend(
                                list.items
                                    .into_iter()
                                    .filter_map(|c| c.namespace_name().map(|(ns, name)| NamespacedName::new(ns, name))),
                            ),
                            Err(e) => warn!(error = %e, "listing csvs for crd fan-out"),
                        }
                    }
                    let object = WatchedObject::Crd { matching_csvs: &matching };
                    apply_routes(&queues, route(&object));
                });
            }),
            Err(e) => warn!(error = %e, "crd watch stream error"),
        }
    }
}

fn owner_label_triple(meta: &ObjectMeta) -> Option<NamespacedName> {
    let labels = meta.labels.as_ref()?;
    let name = labels.get(LABEL_OWNER_NAME)?;
    let namespace = labels.get(LABEL_OWNER_NAMESPACE)?;
    let kind = labels.get(LABEL_OWNER_KIND)?;
    if kind != csv_api::consts::KIND_CLUSTER_SERVICE_VERSION {
        return None;
    }
    Some(NamespacedName::new(namespace.clone(), name.clone()))
}

/// Watches the cluster-scoped kinds eligible for orphan collection via the
/// `olm.owner*` label triple (ClusterRole, ClusterRoleBinding, the two
/// webhook configuration kinds) and routes to `csv` (always) plus
/// `obj-gc` once the owner is confirmed gone.
pub async fn watch_cluster_scoped_owned(client: Client, queues: Arc<Queues>, store: Arc<dyn ObjectStore>) {
    tokio::join!(
        watch_owned_kind::<ClusterRole>(client.clone(), Arc::clone(&queues), Arc::clone(&store), "ClusterRole"),
        watch_owned_kind::<ClusterRoleBinding>(client.clone(), Arc::clone(&queues), Arc::clone(&store), "ClusterRoleBinding"),
        watch_owned_kind::<MutatingWebhookConfiguration>(
            client.clone(),
            Arc::clone(&queues),
            Arc::clone(&store),
            "MutatingWebhookConfiguration"
        ),
        watch_owned_kind::<ValidatingWebhookConfiguration>(client, queues, store, "ValidatingWebhookConfiguration"),
    );
}

async fn watch_owned_kind<K>(client: Client, queues: Arc<Queues>, store: Arc<dyn ObjectStore>, kind: &'static str)
where
    K: Resource<Scope = k8s_openapi::ClusterResourceScope>
        + Clone
        + std::fmt::Debug
        + serde::de::DeserializeOwned
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    debug_assert!(CLUSTER_SCOPED_OWNED_KINDS.contains(&kind));
    let api: Api<K> = Api::all(client);
    let mut stream = watcher::watcher(api, watcher::Config::default()).boxed();
    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => for_each_applied(event, |obj: K| {
                let meta = obj.meta().clone();
                let Some(owner) = owner_label_triple(&meta) else { return };
                let Some(name) = meta.name else { return };
                let store = Arc::clone(&store);
                let queues = Arc::clone(&queues);
                let owner_for_lookup = owner.clone();
                tokio::spawn(async move {
                    let owner_exists = store
                        .get_csv(&owner_for_lookup.namespace, &owner_for_lookup.name)
                        .await
                        .ok()
                        .flatten()
                        .is_some();
                    let object = WatchedObject::OwnedByCsvLabel {
                        owner: owner_for_lookup,
                        kind,
                        name: &name,
                        owner_exists,
                    };
                    apply_routes(&queues, route(&object));
                });
            }),
            Err(e) => warn!(error = %e, kind, "owned cluster-scoped watch stream error"),
        }
    }
}
