use std::collections::BTreeMap;
use std::time::Duration;

use csv_api::csv::ClusterServiceVersion;
use csv_api::installer::InstallerError;
use csv_api::OperatorGroup;

use crate::requirements::RequirementCheckResult;

/// Everything `transition` needs beyond the focal CSV and the clock: an
/// in-memory snapshot assembled by the caller from lister reads (wait-free,
/// no RPCs) plus the outcomes of any I/O the caller already performed this
/// tick (install attempt, check-installed probe, cert-rotation decision).
///
/// Bundling pre-fetched outcomes here — rather than threading `Installer`/
/// `CertProvider` handles into `transition` itself — is what keeps L6 a
/// pure, directly-testable function: the controller does the I/O once per
/// tick and hands the result in, instead of `transition` reaching out.
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    /// All non-copy CSVs in the focal CSV's namespace, keyed by name,
    /// including the focal CSV itself.
    pub namespace_csvs: BTreeMap<String, ClusterServiceVersion>,
    /// OperatorGroups in the focal CSV's namespace.
    pub operator_groups: Vec<OperatorGroup>,
    /// OperatorGroups in every other namespace, for intersection checks.
    pub other_groups: Vec<OperatorGroup>,
    /// Result of the L5 requirement check for this CSV, re-evaluated
    /// every tick.
    pub requirements: Option<RequirementCheckResult>,
    /// Outcome of calling `Installer::install` this tick, if the phase
    /// gate called for it.
    pub install_outcome: Option<Result<(), InstallerError>>,
    /// Outcome of calling `Installer::check_installed` this tick.
    pub check_installed: Option<Result<bool, InstallerError>>,
    /// Whether this CSV's owned APIService resources (Service, Secret,
    /// auth delegation bindings) are all present.
    pub api_service_resources_present: bool,
    /// Whether this CSV's webhook configurations are all present.
    pub webhooks_present: bool,
    /// Whether `CertProvider::should_rotate` returned true this tick.
    pub should_rotate_cert: bool,
    /// Whether any of our owned CRDs/APIServices are already owned by a
    /// different, non-chain-related CSV in the namespace.
    pub owner_conflict: Option<OwnerConflict>,
    /// Whether a webhook name this CSV declares collides with another
    /// CSV's webhook in the namespace, or the descriptor is malformed.
    pub webhook_conflict: bool,
    /// `true` once the predecessor named by `spec.replaces`, if any, has
    /// been observed with an `OperatorCondition` marking it not
    /// upgradeable.
    pub predecessor_not_upgradeable: bool,
}

#[derive(Debug, Clone)]
pub struct OwnerConflict {
    pub owner_csv_name: String,
    pub is_api_service: bool,
}

/// Configuration for the otherwise-hardcoded constants in spec.md §4.1,
/// exposed so they can be set from `csv-controller`'s CLI, per the open
/// question resolution in DESIGN.md.
#[derive(Debug, Clone, Copy)]
pub struct TransitionConfig {
    pub cert_valid_for: Duration,
    pub cert_min_fresh: Duration,
    pub install_timeout: Duration,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            cert_valid_for: Duration::from_secs(730 * 24 * 3600),
            cert_min_fresh: Duration::from_secs(60 * 24 * 3600),
            install_timeout: Duration::from_secs(5 * 60),
        }
    }
}
