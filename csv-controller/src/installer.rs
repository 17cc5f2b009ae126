use async_trait::async_trait;
use csv_api::consts::FIELD_MANAGER;
use csv_api::csv::InstallStrategy;
use csv_api::installer::{Installer, InstallerError};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use tracing::debug;

/// Executes `InstallStrategy::Deployment` by applying each declared
/// Deployment via server-side-apply, mirroring the `ClusterController`'s
/// `Patch::Apply` + fixed field-manager pattern for every owned resource.
pub struct DeploymentInstaller {
    client: Client,
    namespace: String,
}

impl DeploymentInstaller {
    #[must_use]
    pub fn new(client: Client, namespace: String) -> Self {
        Self { client, namespace }
    }

    fn api(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl Installer for DeploymentInstaller {
    async fn install(&self, strategy: &InstallStrategy) -> Result<(), InstallerError> {
        let InstallStrategy::Deployment(deployment_strategy) = strategy else {
            return Err(InstallerError::Unrecoverable("not a Deployment strategy".to_owned()));
        };
        for descriptor in &deployment_strategy.deployment_specs {
            let spec: DeploymentSpec = serde_json::from_value(descriptor.spec.clone())
                .map_err(|e| InstallerError::AnnotationsMissing(format!("{}: {e}", descriptor.name)))?;
            let deployment = Deployment {
                metadata: ObjectMeta {
                    name: Some(descriptor.name.clone()),
                    namespace: Some(self.namespace.clone()),
                    ..Default::default()
                },
                spec: Some(spec),
                status: None,
            };
            debug!(name = %descriptor.name, "applying deployment");
            self.api()
                .patch(
                    &descriptor.name,
                    &PatchParams::apply(FIELD_MANAGER),
                    &Patch::Apply(&deployment),
                )
                .await
                .map_err(|e| InstallerError::Transient(Box::new(e)))?;
        }
        Ok(())
    }

    async fn check_installed(&self, strategy: &InstallStrategy) -> Result<bool, InstallerError> {
        let InstallStrategy::Deployment(deployment_strategy) = strategy else {
            return Err(InstallerError::Unrecoverable("not a Deployment strategy".to_owned()));
        };
        for descriptor in &deployment_strategy.deployment_specs {
            let deployment = self
                .api()
                .get_opt(&descriptor.name)
                .await
                .map_err(|e| InstallerError::Transient(Box::new(e)))?;
            let Some(deployment) = deployment else {
                return Ok(false);
            };
            if !deployment_is_available(&deployment) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A Deployment is considered installed once its `Available` condition is
/// `True` and its spec-requested replicas have all been updated.
fn deployment_is_available(deployment: &Deployment) -> bool {
    let Some(status) = &deployment.status else {
        return false;
    };
    let wanted = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    if status.updated_replicas.unwrap_or(0) < wanted {
        return false;
    }
    status
        .conditions
        .as_ref()
        .is_some_and(|conditions| conditions.iter().any(|c| c.type_ == "Available" && c.status == "True"))
}
