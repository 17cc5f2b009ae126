use async_trait::async_trait;
use chrono::Utc;
use csv_api::certs::{CertProvider, PemBundle};
use csv_api::csv::ClusterServiceVersion;
use rcgen::generate_simple_self_signed;
use sha2::{Digest, Sha256};

/// Self-signed certificate issuance via `rcgen`, good enough for the
/// webhook/APIService serving certs a CSV's deployment mounts. A real
/// deployment would swap this for a provider backed by a cluster CA;
/// `csv-core` never depends on which one is wired in.
pub struct SelfSignedCertProvider;

#[async_trait]
impl CertProvider for SelfSignedCertProvider {
    fn should_rotate(&self, csv: &ClusterServiceVersion) -> bool {
        let Some(status) = &csv.status else {
            return true;
        };
        match status.certs_rotate_at {
            Some(rotate_at) => Utc::now() >= rotate_at,
            None => true,
        }
    }

    async fn issue(&self, csv: &ClusterServiceVersion) -> anyhow::Result<PemBundle> {
        let (namespace, name) = csv
            .namespace_name()
            .ok_or_else(|| anyhow::anyhow!("csv missing namespace/name"))?;
        let san = format!("{name}.{namespace}.svc");
        let certified = generate_simple_self_signed(vec![san])?;
        Ok(PemBundle {
            cert_pem: certified.cert.pem().into_bytes(),
            key_pem: certified.key_pair.serialize_pem().into_bytes(),
        })
    }

    fn fingerprint(&self, bundle: &PemBundle) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&bundle.cert_pem);
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod test {
    use csv_api::csv::{ApiSurfaceSpec, CsvSpec, CsvStatus, DeploymentStrategy, InstallStrategy};
    use csv_api::csv::{CsvPhase, CsvReason};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;

    fn csv_with_status(status: Option<CsvStatus>) -> ClusterServiceVersion {
        ClusterServiceVersion {
            metadata: ObjectMeta {
                namespace: Some("ns".to_owned()),
                name: Some("demo.v1".to_owned()),
                ..Default::default()
            },
            spec: CsvSpec {
                install_strategy: InstallStrategy::Deployment(DeploymentStrategy::default()),
                install_modes: vec![],
                custom_resource_definitions: ApiSurfaceSpec::default(),
                api_service_definitions: ApiSurfaceSpec::default(),
                webhook_definitions: vec![],
                replaces: None,
                min_kube_version: None,
            },
            status,
        }
    }

    #[test]
    fn no_status_needs_rotation() {
        let provider = SelfSignedCertProvider;
        assert!(provider.should_rotate(&csv_with_status(None)));
    }

    #[test]
    fn past_rotate_at_needs_rotation() {
        let provider = SelfSignedCertProvider;
        let mut status = CsvStatus {
            phase: CsvPhase::Succeeded,
            reason: CsvReason::InstallSuccessful,
            ..Default::default()
        };
        status.certs_rotate_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(provider.should_rotate(&csv_with_status(Some(status))));
    }

    #[test]
    fn future_rotate_at_does_not_need_rotation() {
        let provider = SelfSignedCertProvider;
        let mut status = CsvStatus {
            phase: CsvPhase::Succeeded,
            reason: CsvReason::InstallSuccessful,
            ..Default::default()
        };
        status.certs_rotate_at = Some(Utc::now() + chrono::Duration::days(30));
        assert!(!provider.should_rotate(&csv_with_status(Some(status))));
    }

    #[test]
    fn fingerprint_is_stable_for_same_bytes() {
        let provider = SelfSignedCertProvider;
        let bundle = PemBundle {
            cert_pem: b"same-bytes".to_vec(),
            key_pem: vec![],
        };
        assert_eq!(provider.fingerprint(&bundle), provider.fingerprint(&bundle));
    }
}
