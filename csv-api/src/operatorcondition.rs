use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type naming whether the owning CSV may currently be replaced
/// by a successor. Absence of this condition (or any other status) means
/// upgradeable, matching the platform default the Pending-phase gate in
/// spec.md §4.1 relies on.
pub const CONDITION_TYPE_UPGRADEABLE: &str = "Upgradeable";
/// Condition status string meaning the condition holds.
pub const CONDITION_STATUS_TRUE: &str = "True";
/// Condition status string meaning the condition does not hold.
pub const CONDITION_STATUS_FALSE: &str = "False";

/// Read-only platform object (named after its owning CSV) a CSV or its
/// operator can use to report whether it is safe to replace. The core
/// reads this only for one purpose — spec.md §4.1's Pending-phase
/// "previous CSV is marked non-upgradeable" gate.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "operators.coreos.com",
    version = "v2",
    kind = "OperatorCondition",
    plural = "operatorconditions",
    shortname = "condition",
    namespaced
)]
#[kube(status = "OperatorConditionStatus")]
pub struct OperatorConditionSpec {
    /// User-supplied overrides; an override for `Upgradeable` takes
    /// precedence over whatever the operator itself reports in `status`.
    #[serde(default)]
    pub overrides: Vec<Condition>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct OperatorConditionStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
}

impl OperatorCondition {
    /// `false` only when an explicit `Upgradeable=False` is found — in the
    /// override list first, falling back to the reported status. Absence
    /// of the condition in either place defaults to upgradeable.
    #[must_use]
    pub fn is_upgradeable(&self) -> bool {
        if let Some(condition) = find(&self.spec.overrides, CONDITION_TYPE_UPGRADEABLE) {
            return condition.status != CONDITION_STATUS_FALSE;
        }
        if let Some(condition) = self
            .status
            .as_ref()
            .and_then(|s| find(&s.conditions, CONDITION_TYPE_UPGRADEABLE))
        {
            return condition.status != CONDITION_STATUS_FALSE;
        }
        true
    }
}

fn find<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn condition_with(status: Option<OperatorConditionStatus>, overrides: Vec<Condition>) -> OperatorCondition {
        OperatorCondition {
            metadata: ObjectMeta::default(),
            spec: OperatorConditionSpec { overrides },
            status,
        }
    }

    #[test]
    fn absent_condition_defaults_upgradeable() {
        let c = condition_with(None, vec![]);
        assert!(c.is_upgradeable());
    }

    #[test]
    fn status_false_blocks_upgrade() {
        let c = condition_with(
            Some(OperatorConditionStatus {
                conditions: vec![Condition {
                    condition_type: CONDITION_TYPE_UPGRADEABLE.to_owned(),
                    status: CONDITION_STATUS_FALSE.to_owned(),
                }],
            }),
            vec![],
        );
        assert!(!c.is_upgradeable());
    }

    #[test]
    fn override_wins_over_reported_status() {
        let c = condition_with(
            Some(OperatorConditionStatus {
                conditions: vec![Condition {
                    condition_type: CONDITION_TYPE_UPGRADEABLE.to_owned(),
                    status: CONDITION_STATUS_FALSE.to_owned(),
                }],
            }),
            vec![Condition {
                condition_type: CONDITION_TYPE_UPGRADEABLE.to_owned(),
                status: CONDITION_STATUS_TRUE.to_owned(),
            }],
        );
        assert!(c.is_upgradeable());
    }
}
