use csv_api::csv::{ApiSurfaceSpec, PermissionDescriptor, RequirementStatus, RequirementStatusKind};
use csv_api::ApiTriple;

/// Already-fetched state of one CRD, as needed by the requirement checker.
/// Fetching this is out of scope (an `ObjectStore` concern); evaluating it
/// is the pure part specified here.
#[derive(Debug, Clone)]
pub struct CrdState {
    pub triple: ApiTriple,
    pub exists: bool,
    pub version_served: bool,
    pub established: bool,
    pub names_accepted: bool,
}

impl CrdState {
    #[must_use]
    pub fn satisfied(&self) -> bool {
        self.exists && self.version_served && self.established && self.names_accepted
    }
}

/// Already-fetched state of one APIService.
#[derive(Debug, Clone)]
pub struct ApiServiceState {
    pub triple: ApiTriple,
    pub present: bool,
    pub available: bool,
}

impl ApiServiceState {
    #[must_use]
    pub fn satisfied(&self) -> bool {
        self.present && self.available
    }
}

/// Already-fetched state of one declared permission requirement: whether
/// the named service account exists (and who owns it, if anyone), and
/// whether a matching Role/RoleBinding or ClusterRole/ClusterRoleBinding
/// was found for each rule.
#[derive(Debug, Clone)]
pub struct PermissionState {
    pub service_account_name: String,
    pub service_account_exists: bool,
    pub owned_by_other_csv: bool,
    /// One entry per rule in the originating `PermissionDescriptor`, true
    /// when a matching binding was found.
    pub rule_satisfied: Vec<bool>,
}

impl PermissionState {
    #[must_use]
    pub fn status(&self) -> RequirementStatusKind {
        if !self.service_account_exists {
            return RequirementStatusKind::NotPresent;
        }
        if self.owned_by_other_csv || self.rule_satisfied.iter().any(|ok| !ok) {
            return RequirementStatusKind::PresentNotSatisfied;
        }
        RequirementStatusKind::Present
    }
}

/// All the already-fetched inputs the requirement checker needs for one
/// CSV. Assembled by the controller from lister reads before calling
/// `evaluate`.
#[derive(Debug, Clone, Default)]
pub struct RequirementInputs {
    pub crds: Vec<CrdState>,
    pub api_services: Vec<ApiServiceState>,
    pub permissions: Vec<PermissionState>,
    /// `Some(true)` when `spec.minKubeVersion` parses and is `<=` the
    /// discovered server version; `None` when no minimum was declared.
    pub min_kube_version_satisfied: Option<bool>,
    pub min_kube_version_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequirementCheckResult {
    pub met: bool,
    pub rows: Vec<RequirementStatus>,
}

/// Compares a CSV's declared `spec.minKubeVersion` against the discovered
/// orchestration API server version (spec.md §4.4's "minimum platform
/// version" check). `server_major`/`server_minor` are the raw strings a
/// `kube::apimachinery::pkg::version::Info` reports — k8s renders the
/// minor component with a trailing `+` on some platforms (`"24+"`), so
/// only the leading digits are parsed.
///
/// Returns `None` when no minimum is declared (nothing to check) or when
/// either version string fails to parse — an unparseable declared minimum
/// is the CSV author's bug, not a transient condition, so it is reported
/// as unmet rather than silently skipped.
#[must_use]
pub fn check_min_kube_version(
    min_kube_version: Option<&str>,
    server_major: &str,
    server_minor: &str,
) -> (Option<bool>, Option<String>) {
    let Some(min_version) = min_kube_version else {
        return (None, None);
    };
    let Some(minimum) = parse_lenient(min_version) else {
        return (
            Some(false),
            Some(format!("spec.minKubeVersion {min_version:?} is not a valid version")),
        );
    };
    let Some(server) = parse_server_version(server_major, server_minor) else {
        return (
            Some(false),
            Some(format!("could not parse discovered server version {server_major}.{server_minor}")),
        );
    };
    let satisfied = server >= minimum;
    let message = if satisfied {
        String::new()
    } else {
        format!("server version {server} is below the required minimum {minimum}")
    };
    (Some(satisfied), Some(message))
}

fn parse_lenient(version: &str) -> Option<semver::Version> {
    let trimmed = version.trim().trim_start_matches('v');
    semver::Version::parse(trimmed).ok().or_else(|| {
        let padded = match trimmed.matches('.').count() {
            0 => format!("{trimmed}.0.0"),
            1 => format!("{trimmed}.0"),
            _ => return None,
        };
        semver::Version::parse(&padded).ok()
    })
}

fn parse_server_version(major: &str, minor: &str) -> Option<semver::Version> {
    let major: u64 = major.trim().parse().ok()?;
    let minor_digits: String = minor.chars().take_while(char::is_ascii_digit).collect();
    let minor: u64 = minor_digits.parse().ok()?;
    Some(semver::Version::new(major, minor, 0))
}

/// L5 — Requirement Checker.
///
/// Pure evaluation over already-fetched CRD/APIService/RBAC/version state.
/// `owned`/`required` CRDs and APIServices are both checked; a CSV's own
/// owned CRD must also satisfy `satisfied()` before the CSV can progress,
/// matching the source's "owned and required" wording in spec.md §4.4.
#[must_use]
pub fn evaluate(
    crds: &ApiSurfaceSpec,
    api_services: &ApiSurfaceSpec,
    permissions: &[PermissionDescriptor],
    inputs: &RequirementInputs,
) -> RequirementCheckResult {
    let mut rows = Vec::new();
    let mut met = true;

    for triple in crds.owned.iter().chain(crds.required.iter()) {
        let state = inputs.crds.iter().find(|c| &c.triple == triple);
        let (status, message) = match state {
            None => (RequirementStatusKind::NotPresent, "CRD not found".to_owned()),
            Some(s) if s.satisfied() => (RequirementStatusKind::Present, String::new()),
            Some(_) => (
                RequirementStatusKind::PresentNotSatisfied,
                "CRD present but not established".to_owned(),
            ),
        };
        met &= matches!(status, RequirementStatusKind::Present);
        rows.push(RequirementStatus {
            group: triple.group.clone(),
            version: triple.version.clone(),
            kind: triple.kind.clone(),
            name: triple.plural.clone(),
            status,
            message,
            dependents: vec![],
        });
    }

    for triple in api_services.owned.iter().chain(api_services.required.iter()) {
        let state = inputs.api_services.iter().find(|s| &s.triple == triple);
        let (status, message) = match state {
            None => (RequirementStatusKind::NotPresent, "APIService not found".to_owned()),
            Some(s) if s.satisfied() => (RequirementStatusKind::Present, String::new()),
            Some(_) => (
                RequirementStatusKind::PresentNotSatisfied,
                "APIService present but not available".to_owned(),
            ),
        };
        met &= matches!(status, RequirementStatusKind::Present);
        rows.push(RequirementStatus {
            group: triple.group.clone(),
            version: triple.version.clone(),
            kind: "APIService".to_owned(),
            name: triple.plural.clone(),
            status,
            message,
            dependents: vec![],
        });
    }

    for perm in permissions {
        let state = inputs
            .permissions
            .iter()
            .find(|p| p.service_account_name == perm.service_account_name);
        let status = state.map_or(RequirementStatusKind::NotPresent, PermissionState::status);
        met &= matches!(status, RequirementStatusKind::Present);
        rows.push(RequirementStatus {
            group: String::new(),
            version: String::new(),
            kind: "ServiceAccount".to_owned(),
            name: perm.service_account_name.clone(),
            status,
            message: String::new(),
            dependents: vec![],
        });
    }

    if let Some(ok) = inputs.min_kube_version_satisfied {
        met &= ok;
        rows.push(RequirementStatus {
            group: "operators.coreos.com".to_owned(),
            version: "v1alpha1".to_owned(),
            kind: "ClusterServiceVersion".to_owned(),
            name: "minKubeVersion".to_owned(),
            status: if ok {
                RequirementStatusKind::Present
            } else {
                RequirementStatusKind::PresentNotSatisfied
            },
            message: inputs.min_kube_version_message.clone().unwrap_or_default(),
            dependents: vec![],
        });
    }

    RequirementCheckResult { met, rows }
}

#[cfg(test)]
mod test {
    use super::*;
    use csv_api::csv::ApiSurfaceSpec;

    fn triple(kind: &str) -> ApiTriple {
        ApiTriple::new("example.com", "v1", kind)
    }

    #[test]
    fn met_when_all_owned_crds_are_established() {
        let crds = ApiSurfaceSpec {
            owned: vec![triple("Widget")],
            required: vec![],
        };
        let inputs = RequirementInputs {
            crds: vec![CrdState {
                triple: triple("Widget"),
                exists: true,
                version_served: true,
                established: true,
                names_accepted: true,
            }],
            ..Default::default()
        };
        let result = evaluate(&crds, &ApiSurfaceSpec::default(), &[], &inputs);
        assert!(result.met);
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn not_met_when_a_required_crd_is_missing() {
        let crds = ApiSurfaceSpec {
            owned: vec![],
            required: vec![triple("Widget")],
        };
        let inputs = RequirementInputs::default();
        let result = evaluate(&crds, &ApiSurfaceSpec::default(), &[], &inputs);
        assert!(!result.met);
        assert_eq!(result.rows[0].status, RequirementStatusKind::NotPresent);
    }

    #[test]
    fn service_account_owned_by_other_csv_is_present_not_satisfied() {
        let permissions = vec![PermissionDescriptor {
            service_account_name: "sa".to_owned(),
            rules: vec![],
        }];
        let inputs = RequirementInputs {
            permissions: vec![PermissionState {
                service_account_name: "sa".to_owned(),
                service_account_exists: true,
                owned_by_other_csv: true,
                rule_satisfied: vec![],
            }],
            ..Default::default()
        };
        let result = evaluate(&ApiSurfaceSpec::default(), &ApiSurfaceSpec::default(), &permissions, &inputs);
        assert!(!result.met);
        assert_eq!(result.rows[0].status, RequirementStatusKind::PresentNotSatisfied);
    }

    #[test]
    fn min_kube_version_failure_is_reported_on_csv_kind() {
        let inputs = RequirementInputs {
            min_kube_version_satisfied: Some(false),
            min_kube_version_message: Some("server is v1.20, need v1.24".to_owned()),
            ..Default::default()
        };
        let result = evaluate(&ApiSurfaceSpec::default(), &ApiSurfaceSpec::default(), &[], &inputs);
        assert!(!result.met);
        assert_eq!(result.rows[0].kind, "ClusterServiceVersion");
    }

    #[test]
    fn no_min_kube_version_declared_is_not_checked() {
        assert_eq!(check_min_kube_version(None, "1", "26"), (None, None));
    }

    #[test]
    fn server_at_minimum_is_satisfied() {
        let (satisfied, _) = check_min_kube_version(Some("1.24.0"), "1", "24+");
        assert_eq!(satisfied, Some(true));
    }

    #[test]
    fn server_below_minimum_is_unsatisfied() {
        let (satisfied, message) = check_min_kube_version(Some("1.24.0"), "1", "20");
        assert_eq!(satisfied, Some(false));
        assert!(message.unwrap().contains("below the required minimum"));
    }

    #[test]
    fn lenient_major_minor_only_version_parses() {
        let (satisfied, _) = check_min_kube_version(Some("v1.20"), "1", "20");
        assert_eq!(satisfied, Some(true));
    }
}
