use async_trait::async_trait;
use csv_api::consts::FIELD_MANAGER;
use csv_api::csv::ClusterServiceVersion;
use csv_api::operatorgroup::OperatorGroup;
use csv_api::store::ObjectStore;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client};

/// `ObjectStore` implementation backed by `kube::Api<K>`, following the
/// server-side-apply pattern the teacher's `ClusterController` uses for
/// every write: `Patch::Apply` with a fixed field manager, never a
/// read-modify-write `update`.
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn csv_api(&self, namespace: &str) -> Api<ClusterServiceVersion> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn og_api(&self, namespace: &str) -> Api<OperatorGroup> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn list_csvs(&self, namespace: &str) -> anyhow::Result<Vec<ClusterServiceVersion>> {
        Ok(self.csv_api(namespace).list(&ListParams::default()).await?.items)
    }

    async fn get_csv(&self, namespace: &str, name: &str) -> anyhow::Result<Option<ClusterServiceVersion>> {
        Ok(self.csv_api(namespace).get_opt(name).await?)
    }

    async fn create_csv(&self, csv: &ClusterServiceVersion) -> anyhow::Result<ClusterServiceVersion> {
        let namespace = csv.metadata.namespace.as_deref().unwrap_or_default();
        let name = csv.metadata.name.as_deref().unwrap_or_default();
        Ok(self
            .csv_api(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(csv))
            .await?)
    }

    async fn update_csv(&self, csv: &ClusterServiceVersion) -> anyhow::Result<ClusterServiceVersion> {
        self.create_csv(csv).await
    }

    async fn update_csv_status(&self, csv: &ClusterServiceVersion) -> anyhow::Result<ClusterServiceVersion> {
        let namespace = csv.metadata.namespace.as_deref().unwrap_or_default();
        let name = csv.metadata.name.as_deref().unwrap_or_default();
        Ok(self
            .csv_api(namespace)
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(csv))
            .await?)
    }

    async fn delete_csv(&self, namespace: &str, name: &str, grace_period_seconds: Option<i64>) -> anyhow::Result<()> {
        let params = DeleteParams {
            grace_period_seconds: grace_period_seconds.map(|s| s.max(0) as u32),
            ..DeleteParams::default()
        };
        let _ = self.csv_api(namespace).delete(name, &params).await?;
        Ok(())
    }

    async fn list_operator_groups(&self, namespace: &str) -> anyhow::Result<Vec<OperatorGroup>> {
        Ok(self.og_api(namespace).list(&ListParams::default()).await?.items)
    }

    async fn update_operator_group(&self, og: &OperatorGroup) -> anyhow::Result<OperatorGroup> {
        let namespace = og.metadata.namespace.as_deref().unwrap_or_default();
        let name = og.metadata.name.as_deref().unwrap_or_default();
        Ok(self
            .og_api(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(og))
            .await?)
    }

    async fn delete_cluster_scoped(&self, kind: &str, name: &str) -> anyhow::Result<()> {
        // Dynamic dispatch over the handful of cluster-scoped kinds the
        // orphan collector (L9) ever sees, per spec.md §6.
        match kind {
            "ClusterRole" => {
                let api: Api<k8s_openapi::api::rbac::v1::ClusterRole> = Api::all(self.client.clone());
                let _ = api.delete(name, &DeleteParams::default()).await.ok();
            }
            "ClusterRoleBinding" => {
                let api: Api<k8s_openapi::api::rbac::v1::ClusterRoleBinding> = Api::all(self.client.clone());
                let _ = api.delete(name, &DeleteParams::default()).await.ok();
            }
            "MutatingWebhookConfiguration" => {
                let api: Api<k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration> =
                    Api::all(self.client.clone());
                let _ = api.delete(name, &DeleteParams::default()).await.ok();
            }
            "ValidatingWebhookConfiguration" => {
                let api: Api<k8s_openapi::api::admissionregistration::v1::ValidatingWebhookConfiguration> =
                    Api::all(self.client.clone());
                let _ = api.delete(name, &DeleteParams::default()).await.ok();
            }
            other => anyhow::bail!("unsupported cluster-scoped kind for deletion: {other}"),
        }
        Ok(())
    }
}
