use async_trait::async_trait;
use thiserror::Error;

use crate::csv::InstallStrategy;

/// Error classification an `Installer` returns, driving the `InstallReady`
/// and `Installing` phase decisions in spec.md §4.1.
#[derive(Error, Debug)]
pub enum InstallerError {
    /// Stop retrying; only a new cluster-resource-change event should
    /// re-trigger install.
    #[error("unrecoverable: {0}")]
    Unrecoverable(String),
    /// A previously-applied Deployment was mutated out from under us.
    #[error("deployment was updated out of band")]
    DeploymentUpdated,
    /// Required annotations are missing from an applied resource.
    #[error("annotations missing: {0}")]
    AnnotationsMissing(String),
    /// Service temporarily unavailable; retry with backoff.
    #[error("transient: {0}")]
    Transient(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Install-strategy execution, out of scope per spec.md §1 beyond this
/// trait boundary. `csv_controller` ships one implementation that executes
/// `InstallStrategy::Deployment`.
#[async_trait]
pub trait Installer: Send + Sync + 'static {
    async fn install(&self, strategy: &InstallStrategy) -> Result<(), InstallerError>;
    async fn check_installed(&self, strategy: &InstallStrategy) -> Result<bool, InstallerError>;
}

/// Resolves an `Installer` implementation for a strategy, preserving
/// extensibility without reflection per spec.md §9 design notes. Returns
/// `None` for a strategy tag this build has no executor for, which the
/// phase transitioner turns into `InvalidStrategy`.
pub fn installer_for_strategy(strategy: &InstallStrategy) -> Option<&'static str> {
    match strategy {
        InstallStrategy::Deployment(_) => Some("deployment"),
        InstallStrategy::Unknown(_) => None,
    }
}
