use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::apisurface::{ApiSurface, ApiTriple};
use crate::namespace::NamespaceSet;

/// The tenant-authored manifest describing one operator package version.
///
/// Mirrors spec.md §3's `ClusterServiceVersion` entity. Identified by
/// `(namespace, name)`, like any namespaced custom resource.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "operators.coreos.com",
    version = "v1alpha1",
    kind = "ClusterServiceVersion",
    plural = "clusterserviceversions",
    shortname = "csv",
    namespaced
)]
#[kube(status = "CsvStatus")]
pub struct CsvSpec {
    /// Opaque serialized instruction consumed by the `Installer`.
    pub install_strategy: InstallStrategy,
    /// Supported install modes, one boolean per topology.
    #[serde(default)]
    pub install_modes: Vec<InstallModeDescriptor>,
    /// Owned/required CRD surfaces.
    #[serde(default)]
    pub custom_resource_definitions: ApiSurfaceSpec,
    /// Owned/required aggregated-API surfaces.
    #[serde(default)]
    pub api_service_definitions: ApiSurfaceSpec,
    /// Admission webhook descriptors.
    #[serde(default)]
    pub webhook_definitions: Vec<WebhookDescriptor>,
    /// Name of the CSV this one supersedes, in the same namespace.
    #[serde(default)]
    pub replaces: Option<String>,
    /// Minimum platform (orchestration API server) semver this CSV requires.
    #[serde(default)]
    pub min_kube_version: Option<String>,
}

/// Owned/required split shared by CRD and APIService surfaces.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct ApiSurfaceSpec {
    #[serde(default)]
    pub owned: Vec<ApiTriple>,
    #[serde(default)]
    pub required: Vec<ApiTriple>,
}

impl ApiSurfaceSpec {
    #[must_use]
    pub fn owned_surface(&self) -> ApiSurface {
        ApiSurface::from_triples(self.owned.iter().cloned())
    }

    #[must_use]
    pub fn required_surface(&self) -> ApiSurface {
        ApiSurface::from_triples(self.required.iter().cloned())
    }
}

/// Opaque, tagged install-strategy instruction. Only `Deployment` is
/// executed by the shipped `Installer`; other tags parse but are rejected
/// at the `InstallReady` gate with `InvalidStrategy` unless a custom
/// `Installer` is registered for them (see `InstallerForStrategy` in
/// DESIGN.md).
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(tag = "strategy", content = "spec", rename_all = "camelCase")]
pub enum InstallStrategy {
    Deployment(DeploymentStrategy),
    /// An install strategy kind this build does not know how to execute.
    Unknown(serde_json::Value),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct DeploymentStrategy {
    #[serde(default)]
    pub deployment_specs: Vec<DeploymentSpecDescriptor>,
    #[serde(default)]
    pub cluster_permissions: Vec<PermissionDescriptor>,
    #[serde(default)]
    pub permissions: Vec<PermissionDescriptor>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct DeploymentSpecDescriptor {
    pub name: String,
    pub spec: serde_json::Value,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct PermissionDescriptor {
    pub service_account_name: String,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct PolicyRule {
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default)]
    pub non_resource_urls: Vec<String>,
}

impl PolicyRule {
    /// Whether this rule targets cluster-scoped or non-resource-URL
    /// permissions, which must be satisfied via ClusterRole/ClusterRoleBinding
    /// rather than the namespaced Role/RoleBinding pair.
    #[must_use]
    pub fn is_cluster_scoped(&self) -> bool {
        !self.non_resource_urls.is_empty()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct WebhookDescriptor {
    pub generate_name: String,
    #[serde(rename = "type")]
    pub webhook_type: WebhookType,
    #[serde(default)]
    pub rules: Vec<WebhookRule>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum WebhookType {
    ValidatingAdmissionWebhook,
    MutatingAdmissionWebhook,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct WebhookRule {
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub api_versions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub operations: Vec<String>,
}

/// The four install-mode topologies a CSV may declare support for.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "PascalCase")]
pub enum InstallModeType {
    OwnNamespace,
    SingleNamespace,
    MultiNamespace,
    AllNamespaces,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct InstallModeDescriptor {
    #[serde(rename = "type")]
    pub mode_type: InstallModeType,
    pub supported: bool,
}

/// A parsed `spec.installModes` list, queryable by topology.
#[derive(Debug, Clone, Default)]
pub struct InstallModeSet(BTreeMap<InstallModeType, bool>);

impl InstallModeSet {
    #[must_use]
    pub fn parse(descriptors: &[InstallModeDescriptor]) -> Self {
        Self(descriptors.iter().map(|d| (d.mode_type, d.supported)).collect())
    }

    /// `false` when the mode is absent from the declared list — an
    /// undeclared mode is treated as unsupported, not "unknown".
    #[must_use]
    pub fn supports(&self, mode: InstallModeType) -> bool {
        self.0.get(&mode).copied().unwrap_or(false)
    }

    /// Whether the declared modes support the given resolved target set,
    /// per spec.md §4.1 step 5.
    #[must_use]
    pub fn supports_targets(&self, operator_namespace: &str, targets: &NamespaceSet) -> bool {
        if targets.is_all_namespaces() {
            return self.supports(InstallModeType::AllNamespaces);
        }
        if targets.len() == 1 {
            let only = targets.iter().next().unwrap_or("");
            if only == operator_namespace {
                return self.supports(InstallModeType::OwnNamespace);
            }
            return self.supports(InstallModeType::SingleNamespace);
        }
        self.supports(InstallModeType::MultiNamespace)
    }
}

/// `status.phase`: one of the eight lifecycle phases in spec.md §3/§4.1.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum CsvPhase {
    #[default]
    None,
    Pending,
    InstallReady,
    Installing,
    Succeeded,
    Failed,
    Replacing,
    Deleting,
}

/// `status.reason`: the closed enum of condition reasons from spec.md §3.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum CsvReason {
    #[default]
    RequirementsUnknown,
    RequirementsNotMet,
    RequirementsMet,
    InvalidStrategy,
    ComponentFailed,
    ComponentFailedNoRetry,
    InstallSuccessful,
    ComponentUnhealthy,
    NeedsReinstall,
    NeedsCertRotation,
    ApiServiceInstallFailed,
    ApiServiceResourceIssue,
    ApiServiceResourcesNeedReinstall,
    OwnerConflict,
    InterOperatorGroupOwnerConflict,
    CannotModifyStaticOperatorGroupProvidedApis,
    NoOperatorGroup,
    NoTargetNamespaces,
    TooManyOperatorGroups,
    UnsupportedOperatorGroup,
    InvalidInstallModes,
    InvalidWebhookDescription,
    OperatorConditionNotUpgradeable,
    BeingReplaced,
    Replaced,
    Copied,
    DetectedClusterChange,
    InstallCheckFailed,
}

/// Status of a single owned/required CRD, APIService, RBAC rule or
/// minimum-platform-version check.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct RequirementStatus {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    pub status: RequirementStatusKind,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub dependents: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum RequirementStatusKind {
    Present,
    NotPresent,
    /// A CRD/APIService that exists but is not yet `Established`/`Available`,
    /// or a service account owned by a different CSV.
    PresentNotSatisfied,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct CsvStatus {
    #[serde(default)]
    pub phase: CsvPhase,
    #[serde(default)]
    pub reason: CsvReason,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub requirement_status: Vec<RequirementStatus>,
    pub last_update_time: Option<DateTime<Utc>>,
    pub last_transition_time: Option<DateTime<Utc>>,
    pub certs_last_updated: Option<DateTime<Utc>>,
    pub certs_rotate_at: Option<DateTime<Utc>>,
}

impl CsvStatus {
    /// A copy is any CSV whose status reason is `Copied` — see spec.md §3
    /// invariants: copies are never transitioned by the main state machine.
    #[must_use]
    pub fn is_copy(&self) -> bool {
        matches!(self.reason, CsvReason::Copied)
    }
}

impl ClusterServiceVersion {
    #[must_use]
    pub fn namespace_name(&self) -> Option<(&str, &str)> {
        Some((self.metadata.namespace.as_deref()?, self.metadata.name.as_deref()?))
    }

    #[must_use]
    pub fn is_copy(&self) -> bool {
        self.status.as_ref().is_some_and(CsvStatus::is_copy)
    }

    #[must_use]
    pub fn provided_apis(&self) -> ApiSurface {
        self.spec
            .custom_resource_definitions
            .owned_surface()
            .union(&self.spec.api_service_definitions.owned_surface())
    }

    #[must_use]
    pub fn required_apis(&self) -> ApiSurface {
        self.spec
            .custom_resource_definitions
            .required_surface()
            .union(&self.spec.api_service_definitions.required_surface())
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }
}
