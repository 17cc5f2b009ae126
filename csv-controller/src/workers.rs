use std::sync::Arc;

use chrono::Utc;
use csv_api::consts::{ANNOTATION_OPERATOR_GROUP, ANNOTATION_OPERATOR_NAMESPACE};
use csv_api::namespace::NamespaceSet;
use csv_api::store::ObjectStore;
use csv_core::operatorgroup::{resolve_target_namespaces, status_needs_update, NamespaceLabels};
use csv_core::orphan::{decide, OwnerLookup};
use csv_core::{copy, prune};
use csv_queue::NamespacedName;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client};
use tracing::{debug, warn};

use crate::reconcile::ReconcileContext;

/// `csv-copy` queue worker: projects a non-copy CSV's desired copies into
/// every target namespace beyond its own, creating or re-applying drifted
/// ones. Driven off the `csv` key — the same namespace/name pair names
/// both the parent and the copies it owns.
pub async fn sync_csv_copy(ctx: &ReconcileContext, key: &NamespacedName) -> anyhow::Result<()> {
    let Some(parent) = ctx.store.get_csv(&key.namespace, &key.name).await? else {
        return Ok(());
    };
    if parent.is_copy() {
        return Ok(());
    }
    let Some(group_namespace) = parent.annotation(ANNOTATION_OPERATOR_NAMESPACE) else {
        return Ok(());
    };
    let Some(group_name) = parent.annotation(ANNOTATION_OPERATOR_GROUP) else {
        return Ok(());
    };
    let groups = ctx.store.list_operator_groups(group_namespace).await?;
    let Some(group) = groups.into_iter().find(|g| g.metadata.name.as_deref() == Some(group_name)) else {
        return Ok(());
    };
    let targets = group.target_namespace_set();
    if !copy::should_project(&parent, &targets) {
        return Ok(());
    }
    let owed = copy::copy_target_namespaces(&parent, &targets);
    for namespace in owed {
        let existing = ctx.store.get_csv(namespace, &key.name).await?;
        let wants_write = match &existing {
            None => true,
            Some(existing) => copy::has_drifted(existing, &parent),
        };
        if wants_write {
            let desired = copy::copy_spec_for(&parent, namespace, Utc::now());
            match existing {
                None => {
                    ctx.store.create_csv(&desired).await?;
                }
                Some(_) => {
                    ctx.store.update_csv(&desired).await?;
                }
            }
        }
    }
    Ok(())
}

/// `csv-gc` queue worker: prunes one copy if it has gone dangling, per
/// spec.md §4.5.
pub async fn sync_csv_gc(ctx: &ReconcileContext, key: &NamespacedName) -> anyhow::Result<()> {
    let Some(copy_csv) = ctx.store.get_csv(&key.namespace, &key.name).await? else {
        return Ok(());
    };
    let operator_namespace = copy_csv.annotation(ANNOTATION_OPERATOR_NAMESPACE).map(str::to_owned);
    let parent = match &operator_namespace {
        Some(ns) => ctx.store.get_csv(ns, &key.name).await?,
        None => None,
    };
    if prune::is_dangling(&copy_csv, parent.as_ref()) {
        debug!(namespace = %key.namespace, name = %key.name, "pruning dangling copy");
        ctx.store.delete_csv(&key.namespace, &key.name, Some(0)).await?;
    }
    Ok(())
}

/// `og` queue worker: resolves one OperatorGroup's target namespaces and
/// persists `status.namespaces` when it has drifted. Cluster-role
/// provisioning for the aggregate provided-API surface is left to the
/// per-CSV `EnsureClusterRoles` effect, as `transition` already re-asserts
/// it every `Succeeded` tick.
pub async fn sync_operator_group(ctx: &ReconcileContext, key: &NamespacedName) -> anyhow::Result<()> {
    let groups = ctx.store.list_operator_groups(&key.namespace).await?;
    let Some(mut group) = groups.into_iter().find(|g| g.metadata.name.as_deref() == Some(key.name.as_str())) else {
        return Ok(());
    };

    let namespace_api: Api<Namespace> = Api::all(ctx.client.clone());
    let all_namespaces: Vec<NamespaceLabels> = namespace_api
        .list(&kube::api::ListParams::default())
        .await?
        .items
        .into_iter()
        .filter_map(|ns| {
            let name = ns.metadata.name?;
            let labels = ns.metadata.labels.unwrap_or_default().into_iter().collect();
            Some(NamespaceLabels { name, labels })
        })
        .collect();

    let resolved = resolve_target_namespaces(&group.spec, &all_namespaces);
    let current = group.status.as_ref().map(|s| s.namespace_set()).unwrap_or_else(NamespaceSet::empty);
    if status_needs_update(&current, &resolved) {
        let status = group.status.get_or_insert_with(Default::default);
        status.namespaces = resolved.iter().map(str::to_owned).collect();
        ctx.store.update_operator_group(&group).await?;
        for namespace in resolved.iter() {
            ctx.queues.csv.add(NamespacedName::new(namespace, key.name.clone()));
        }
    }
    Ok(())
}

/// `obj-gc` queue worker: deletes a cluster-scoped object once its owning
/// CSV (named by the `olm.owner*` label triple) is confirmed gone.
pub async fn sync_obj_gc(ctx: &ReconcileContext, kind: &str, name: &str, owner_namespace: &str, owner_name: &str) -> anyhow::Result<()> {
    let lookup = match ctx.store.get_csv(owner_namespace, owner_name).await {
        Ok(Some(_)) => OwnerLookup::Found,
        Ok(None) => OwnerLookup::NotFound,
        Err(e) => {
            warn!(error = %e, "obj-gc owner lookup failed");
            OwnerLookup::LookupError
        }
    };
    match decide(lookup) {
        csv_core::orphan::OrphanOutcome::Delete => {
            ctx.store.delete_cluster_scoped(kind, name).await?;
        }
        csv_core::orphan::OrphanOutcome::Retry => {
            ctx.queues.obj_gc.add(format!("{kind}/{name}"));
        }
        csv_core::orphan::OrphanOutcome::Propagate => {
            anyhow::bail!("owner lookup failed for {kind}/{name}, labelled owner {owner_namespace}/{owner_name}");
        }
    }
    Ok(())
}

/// Used by `main.rs`'s watch-event handler to know which OperatorGroup to
/// re-enqueue for a Namespace mutation.
pub async fn member_groups_of(store: &Arc<dyn ObjectStore>, namespace: &str) -> anyhow::Result<Vec<NamespacedName>> {
    let mut members = Vec::new();
    for group in store.list_operator_groups(namespace).await.unwrap_or_default() {
        if let Some(name) = group.metadata.name.clone() {
            if let Some(group_namespace) = group.metadata.namespace.clone() {
                if group
                    .status
                    .as_ref()
                    .map(|s| s.namespace_set().contains(namespace))
                    .unwrap_or(false)
                {
                    members.push(NamespacedName::new(group_namespace, name));
                }
            }
        }
    }
    Ok(members)
}
