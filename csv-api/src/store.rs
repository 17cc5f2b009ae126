use async_trait::async_trait;

use crate::csv::ClusterServiceVersion;
use crate::operatorgroup::OperatorGroup;

/// Opaque platform client the core reconciles against. Out of scope per
/// spec.md §1 — this trait only names the verbs the core needs; the
/// concrete implementation (`csv_controller::kube_store::KubeObjectStore`)
/// wraps `kube::Api<K>` the way `XlineHandle` in the teacher crate wraps
/// `kube::Api<Pod>`.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn list_csvs(&self, namespace: &str) -> anyhow::Result<Vec<ClusterServiceVersion>>;
    async fn get_csv(&self, namespace: &str, name: &str) -> anyhow::Result<Option<ClusterServiceVersion>>;
    async fn create_csv(&self, csv: &ClusterServiceVersion) -> anyhow::Result<ClusterServiceVersion>;
    async fn update_csv(&self, csv: &ClusterServiceVersion) -> anyhow::Result<ClusterServiceVersion>;
    async fn update_csv_status(&self, csv: &ClusterServiceVersion) -> anyhow::Result<ClusterServiceVersion>;
    /// Deletes a CSV. `grace_period_seconds = Some(0)` requests immediate
    /// deletion, as issued from the `Deleting` phase handler.
    async fn delete_csv(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: Option<i64>,
    ) -> anyhow::Result<()>;

    async fn list_operator_groups(&self, namespace: &str) -> anyhow::Result<Vec<OperatorGroup>>;
    async fn update_operator_group(&self, og: &OperatorGroup) -> anyhow::Result<OperatorGroup>;

    /// Deletes an arbitrary cluster-scoped object identified by kind/name,
    /// used by the orphan collector (L9). Returns `Ok(())` even if the
    /// object was already gone.
    async fn delete_cluster_scoped(&self, kind: &str, name: &str) -> anyhow::Result<()>;
}
