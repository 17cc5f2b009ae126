use async_trait::async_trait;

use crate::csv::ClusterServiceVersion;

/// A PEM-encoded certificate/key bundle issued for a CSV's webhooks or
/// APIServices.
#[derive(Debug, Clone)]
pub struct PemBundle {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

/// Certificate issuance/rotation, out of scope per spec.md §1 beyond this
/// trait boundary.
#[async_trait]
pub trait CertProvider: Send + Sync + 'static {
    /// Whether a CSV's certificate should be rotated now.
    fn should_rotate(&self, csv: &ClusterServiceVersion) -> bool;
    async fn issue(&self, csv: &ClusterServiceVersion) -> anyhow::Result<PemBundle>;
    fn fingerprint(&self, bundle: &PemBundle) -> String;
}
