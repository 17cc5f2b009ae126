use async_trait::async_trait;

use crate::apisurface::ApiSurface;
use crate::csv::PermissionDescriptor;

/// Provisions the ServiceAccounts/Role(Binding)s/ClusterRole(Binding)s a
/// CSV's `permissions`/`clusterPermissions` declare, out of scope per
/// spec.md §1 beyond this trait boundary. `csv-core`'s requirement checker
/// only reads back whether these exist; creating them is this trait's job,
/// invoked by the controller before `Installer::install`.
#[async_trait]
pub trait RBACEnsurer: Send + Sync + 'static {
    async fn ensure_namespaced(&self, namespace: &str, permissions: &[PermissionDescriptor]) -> anyhow::Result<()>;
    async fn ensure_cluster_scoped(&self, namespace: &str, permissions: &[PermissionDescriptor]) -> anyhow::Result<()>;

    /// Ensures view/edit/admin ClusterRoles exist for a CSV's provided API
    /// surface, re-asserted on every steady-state `Succeeded` tick per
    /// spec.md §4.1. Labeled with the owner-label triple so the Orphan
    /// Collector (L9) reclaims them once the owning CSV is gone.
    async fn ensure_provided_api_cluster_roles(
        &self,
        csv_namespace: &str,
        csv_name: &str,
        provided: &ApiSurface,
    ) -> anyhow::Result<()>;
}
