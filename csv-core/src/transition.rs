//! L6 — Phase Transitioner: the CSV lifecycle state machine from spec.md §4.1.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use csv_api::apisurface::{ApiSurface, ApiTriple};
use csv_api::clock::Clock;
use csv_api::consts::{
    ANNOTATION_OPERATOR_GROUP, ANNOTATION_OPERATOR_NAMESPACE, ANNOTATION_TARGET_NAMESPACES,
    API_LABEL_PREFIX, API_LABEL_VALUE_PROVIDED, API_LABEL_VALUE_REQUIRED,
};
use csv_api::csv::{ClusterServiceVersion, CsvPhase, CsvReason, InstallModeSet};
use csv_api::error::SyncError;
use csv_api::installer::{installer_for_strategy, InstallerError};
use csv_api::namespace::NamespaceSet;

use crate::effects::SideEffect;
use crate::intersection::{self, GroupSurface, IntersectionOutcome};
use crate::replacement;
use crate::world::{TransitionConfig, WorldSnapshot};

/// Result of one `transition` call: a fresh CSV snapshot (callers diff and
/// persist only the fields that changed), the side effects to execute, and
/// an optional error driving queue retry behavior.
pub struct TransitionOutput {
    pub csv: ClusterServiceVersion,
    pub effects: Vec<SideEffect>,
    pub error: Option<SyncError>,
}

fn done(csv: ClusterServiceVersion, effects: Vec<SideEffect>, error: Option<SyncError>) -> TransitionOutput {
    TransitionOutput { csv, effects, error }
}

fn set_status(
    csv: &mut ClusterServiceVersion,
    now: DateTime<Utc>,
    phase: CsvPhase,
    reason: CsvReason,
    message: impl Into<String>,
) {
    let status = csv.status.get_or_insert_with(Default::default);
    if status.phase != phase {
        status.last_transition_time = Some(now);
    }
    status.phase = phase;
    status.reason = reason;
    status.message = message.into();
    status.last_update_time = Some(now);
}

fn current_phase(csv: &ClusterServiceVersion) -> CsvPhase {
    csv.status.as_ref().map(|s| s.phase).unwrap_or_default()
}

fn current_reason(csv: &ClusterServiceVersion) -> CsvReason {
    csv.status.as_ref().map(|s| s.reason).unwrap_or_default()
}

fn fail(
    mut csv: ClusterServiceVersion,
    now: DateTime<Utc>,
    reason: CsvReason,
    message: impl Into<String>,
    effects: Vec<SideEffect>,
) -> TransitionOutput {
    set_status(&mut csv, now, CsvPhase::Failed, reason, message);
    done(csv, effects, None)
}

/// Whether a CSV carries webhooks or owned APIServices, which require a
/// certificate; only these CSVs get cert-rotation bookkeeping on install.
fn is_ca_bearing(csv: &ClusterServiceVersion) -> bool {
    !csv.spec.webhook_definitions.is_empty() || !csv.spec.api_service_definitions.owned.is_empty()
}

/// The desired `olm.api.<hash>` label set for a CSV's provided/required
/// surfaces, merged with any non-API labels already present.
fn desired_labels(
    existing: &BTreeMap<String, String>,
    provided: &ApiSurface,
    required: &ApiSurface,
) -> BTreeMap<String, String> {
    let mut labels: BTreeMap<String, String> = existing
        .iter()
        .filter(|(k, _)| !k.starts_with(API_LABEL_PREFIX))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for triple in provided.iter() {
        labels.insert(api_label_key(triple), API_LABEL_VALUE_PROVIDED.to_owned());
    }
    for triple in required.iter() {
        labels
            .entry(api_label_key(triple))
            .or_insert_with(|| API_LABEL_VALUE_REQUIRED.to_owned());
    }
    labels
}

fn api_label_key(triple: &ApiTriple) -> String {
    format!("{API_LABEL_PREFIX}{}", triple.label_hash())
}

fn ensure_api_labels(csv: &mut ClusterServiceVersion, provided: &ApiSurface, required: &ApiSurface) {
    let existing = csv.metadata.labels.clone().unwrap_or_default();
    let desired = desired_labels(&existing, provided, required);
    if desired != existing {
        csv.metadata.labels = Some(desired);
    }
}

fn annotations_match(csv: &ClusterServiceVersion, group_name: &str, group_ns: &str, targets: &NamespaceSet) -> bool {
    csv.annotation(ANNOTATION_OPERATOR_GROUP) == Some(group_name)
        && csv.annotation(ANNOTATION_OPERATOR_NAMESPACE) == Some(group_ns)
        && csv.annotation(ANNOTATION_TARGET_NAMESPACES) == Some(targets.to_annotation().as_str())
}

fn write_group_annotations(csv: &mut ClusterServiceVersion, group_name: &str, group_ns: &str, targets: &NamespaceSet) {
    let annotations = csv.metadata.annotations.get_or_insert_with(Default::default);
    annotations.insert(ANNOTATION_OPERATOR_GROUP.to_owned(), group_name.to_owned());
    annotations.insert(ANNOTATION_OPERATOR_NAMESPACE.to_owned(), group_ns.to_owned());
    annotations.insert(ANNOTATION_TARGET_NAMESPACES.to_owned(), targets.to_annotation());
}

/// `Transition(csvIn, now) → (csvOut, syncErr)` — spec.md §4.1.
#[must_use]
pub fn transition(
    csv_in: &ClusterServiceVersion,
    world: &WorldSnapshot,
    clock: &dyn Clock,
    config: &TransitionConfig,
) -> TransitionOutput {
    let now = clock.now();
    let mut csv = csv_in.clone();

    // 1. Fast-exit for "no retry" failures.
    if matches!(current_reason(&csv), CsvReason::ComponentFailedNoRetry) {
        return done(csv, vec![], None);
    }

    // Copies are never transitioned by the main state machine (spec.md §3
    // invariant, tested as invariant 1 in spec.md §8).
    if csv.is_copy() {
        return done(csv, vec![], None);
    }

    // 2. Derive operator surface. Our typed `CsvSpec` cannot fail to parse
    // at this point (that happens at the API-server admission boundary);
    // we still compute the surfaces here, matching spec.md step 2.
    let provided = csv.provided_apis();
    let required = csv.required_apis();

    // 3. Ensure API labels.
    ensure_api_labels(&mut csv, &provided, &required);

    // 4. Resolve OperatorGroup.
    match world.operator_groups.len() {
        0 => return fail(csv, now, CsvReason::NoOperatorGroup, "no OperatorGroup found in this namespace", vec![]),
        n if n > 1 => {
            return fail(
                csv,
                now,
                CsvReason::TooManyOperatorGroups,
                "more than one OperatorGroup found in this namespace",
                vec![],
            )
        }
        _ => {}
    }
    let group = &world.operator_groups[0];
    let group_name = group.metadata.name.clone().unwrap_or_default();
    let group_ns = group.metadata.namespace.clone().unwrap_or_default();
    let targets = group.target_namespace_set();

    if !annotations_match(&csv, &group_name, &group_ns, &targets) {
        write_group_annotations(&mut csv, &group_name, &group_ns, &targets);
        return done(csv, vec![], None);
    }

    // 5. Install-modes check.
    let modes = InstallModeSet::parse(&csv.spec.install_modes);
    let operator_namespace = csv.metadata.namespace.clone().unwrap_or_default();
    if !modes.supports_targets(&operator_namespace, &targets) {
        return fail(
            csv,
            now,
            CsvReason::UnsupportedOperatorGroup,
            "install modes do not support the OperatorGroup's target namespaces",
            vec![],
        );
    }

    // 6. Intersection reconciliation.
    let group_provided = group.provided_apis();
    let other_surfaces: Vec<(ApiSurface, NamespaceSet)> = world
        .other_groups
        .iter()
        .map(|og| (og.provided_apis(), og.target_namespace_set()))
        .collect();
    let other_refs: Vec<GroupSurface<'_>> = other_surfaces
        .iter()
        .map(|(provided, targets)| GroupSurface { provided, targets })
        .collect();
    let our_group_surface = GroupSurface { provided: &group_provided, targets: &targets };
    let outcome = intersection::reconcile(&provided, &our_group_surface, &other_refs);

    match outcome {
        IntersectionOutcome::ApiConflict => {
            if current_reason(&csv) != CsvReason::InterOperatorGroupOwnerConflict {
                return fail(
                    csv,
                    now,
                    CsvReason::InterOperatorGroupOwnerConflict,
                    "provided APIs conflict with an intersecting OperatorGroup",
                    vec![SideEffect::TearDownDeployments],
                );
            }
            return done(csv, vec![], None);
        }
        IntersectionOutcome::AddApis | IntersectionOutcome::RemoveApis => {
            if group.spec.static_provided_apis {
                return fail(
                    csv,
                    now,
                    CsvReason::CannotModifyStaticOperatorGroupProvidedApis,
                    "OperatorGroup has static provided APIs and cannot be updated",
                    vec![],
                );
            }
            let merged = match outcome {
                IntersectionOutcome::AddApis => group_provided.union(&provided),
                _ => group_provided.intersection(&provided),
            };
            return done(
                csv,
                vec![
                    SideEffect::UpdateOperatorGroupProvidedApis {
                        group_namespace: group_ns,
                        group_name,
                        provided_apis: merged,
                    },
                    SideEffect::RequeueSelf,
                ],
                None,
            );
        }
        IntersectionOutcome::NoOp => {}
    }

    // From here on, the intersection outcome is guaranteed NoOp.
    let phase = current_phase(&csv);
    let name = csv.metadata.name.clone().unwrap_or_default();
    let reqs_met = world.requirements.as_ref().map_or(false, |r| r.met);

    match phase {
        CsvPhase::None => {
            set_status(&mut csv, now, CsvPhase::Pending, CsvReason::RequirementsUnknown, "");
            done(csv, vec![], None)
        }

        CsvPhase::Pending => {
            if world.predecessor_not_upgradeable {
                set_status(
                    &mut csv,
                    now,
                    CsvPhase::Pending,
                    CsvReason::OperatorConditionNotUpgradeable,
                    "the CSV being replaced is marked not upgradeable",
                );
                return done(csv, vec![], None);
            }
            if !reqs_met {
                set_status(&mut csv, now, CsvPhase::Pending, CsvReason::RequirementsNotMet, "requirements not yet satisfied");
                return done(csv, vec![], Some(SyncError::RequirementsNotMet));
            }
            if world.webhook_conflict {
                return fail(csv, now, CsvReason::InvalidWebhookDescription, "duplicate or invalid webhook description", vec![]);
            }
            if let Some(conflict) = &world.owner_conflict {
                let message = if conflict.is_api_service {
                    format!("APIService already owned by CSV {}", conflict.owner_csv_name)
                } else {
                    format!("CRD already owned by CSV {}", conflict.owner_csv_name)
                };
                return fail(csv, now, CsvReason::OwnerConflict, message, vec![]);
            }
            if let Some(predecessor) = replacement::direct_predecessor(&world.namespace_csvs, &csv) {
                if current_phase(predecessor) != CsvPhase::Replacing {
                    return done(csv, vec![], None);
                }
            }
            set_status(&mut csv, now, CsvPhase::InstallReady, CsvReason::RequirementsMet, "requirements satisfied");
            done(csv, vec![], None)
        }

        CsvPhase::InstallReady => {
            if installer_for_strategy(&csv.spec.install_strategy).is_none() {
                return fail(csv, now, CsvReason::InvalidStrategy, "unsupported install strategy", vec![]);
            }
            match &world.install_outcome {
                Some(Err(InstallerError::Unrecoverable(msg))) => {
                    fail(csv, now, CsvReason::ComponentFailedNoRetry, msg.clone(), vec![])
                }
                Some(Err(other)) => fail(csv, now, CsvReason::ComponentFailed, other.to_string(), vec![]),
                Some(Ok(())) => {
                    if is_ca_bearing(&csv) {
                        let status = csv.status.get_or_insert_with(Default::default);
                        status.certs_last_updated = Some(now);
                        status.certs_rotate_at = Some(
                            now + chrono::Duration::from_std(config.cert_valid_for).unwrap_or_default()
                                - chrono::Duration::from_std(config.cert_min_fresh).unwrap_or_default(),
                        );
                    }
                    set_status(&mut csv, now, CsvPhase::Installing, CsvReason::InstallSuccessful, "install strategy applied");
                    done(csv, vec![SideEffect::RequeueSelf], None)
                }
                None => done(csv, vec![], Some(SyncError::TransientPlatformError(Box::new(std::io::Error::other("install not attempted"))))),
            }
        }

        CsvPhase::Installing => {
            let healthy = matches!(&world.check_installed, Some(Ok(true)))
                && world.api_service_resources_present
                && world.webhooks_present;
            if healthy {
                set_status(&mut csv, now, CsvPhase::Succeeded, CsvReason::InstallSuccessful, "install check succeeded");
                return done(csv, vec![], None);
            }
            if matches!(&world.check_installed, Some(Err(InstallerError::Transient(_)))) {
                return done(csv, vec![], Some(SyncError::TransientPlatformError(Box::new(std::io::Error::other("install check unavailable")))));
            }
            let last_transition = csv.status.as_ref().and_then(|s| s.last_transition_time).unwrap_or(now);
            let elapsed = now.signed_duration_since(last_transition);
            let timeout = chrono::Duration::from_std(config.install_timeout).unwrap_or_default();
            let checking_failed = matches!(&world.check_installed, Some(Ok(false)) | Some(Err(_)));
            if elapsed >= timeout && checking_failed {
                return fail(csv, now, CsvReason::InstallCheckFailed, "install check did not succeed within the timeout", vec![]);
            }
            done(csv, vec![], None)
        }

        CsvPhase::Succeeded => {
            if replacement::direct_successor(&world.namespace_csvs, &name).is_some() {
                set_status(&mut csv, now, CsvPhase::Replacing, CsvReason::BeingReplaced, "being replaced by a successor CSV");
                return done(
                    csv,
                    vec![],
                    Some(SyncError::TransientPlatformError(Box::new(std::io::Error::other("replacing")))),
                );
            }
            if !world.api_service_resources_present {
                return fail(csv, now, CsvReason::ApiServiceResourceIssue, "APIService resources are missing", vec![]);
            }
            if world.should_rotate_cert {
                set_status(&mut csv, now, CsvPhase::Pending, CsvReason::NeedsCertRotation, "certificate needs rotation");
                return done(csv, vec![], None);
            }
            if !reqs_met {
                return fail(csv, now, CsvReason::RequirementsNotMet, "requirements no longer satisfied", vec![]);
            }
            if matches!(&world.check_installed, Some(Ok(false)) | Some(Err(_))) {
                return fail(csv, now, CsvReason::ComponentUnhealthy, "install check reports unhealthy components", vec![]);
            }
            done(csv, vec![SideEffect::EnsureClusterRoles(provided.clone())], None)
        }

        CsvPhase::Failed => {
            let reason = current_reason(&csv);
            let recovers = matches!(
                reason,
                CsvReason::NoTargetNamespaces
                    | CsvReason::NoOperatorGroup
                    | CsvReason::TooManyOperatorGroups
                    | CsvReason::UnsupportedOperatorGroup
                    | CsvReason::InterOperatorGroupOwnerConflict
                    | CsvReason::CannotModifyStaticOperatorGroupProvidedApis
            );
            if recovers {
                set_status(&mut csv, now, CsvPhase::Pending, CsvReason::RequirementsUnknown, "preconditions resolved");
                return done(csv, vec![], None);
            }
            let all_ok = reqs_met
                && world.api_service_resources_present
                && !world.should_rotate_cert
                && matches!(&world.check_installed, Some(Ok(true)));
            if all_ok {
                set_status(&mut csv, now, CsvPhase::Pending, CsvReason::NeedsReinstall, "requirements satisfied again, reinstalling");
            }
            done(csv, vec![], None)
        }

        CsvPhase::Replacing => {
            if !replacement::is_earliest(&world.namespace_csvs, &csv) {
                return done(csv, vec![], None);
            }
            match replacement::direct_successor(&world.namespace_csvs, &name) {
                None => done(csv, vec![], Some(SyncError::ConfigConflict("marked replacee but no replacement found".to_owned()))),
                Some(successor) => {
                    if current_phase(successor) == CsvPhase::Succeeded {
                        set_status(&mut csv, now, CsvPhase::Deleting, CsvReason::Replaced, "successor has succeeded");
                        done(csv, vec![], None)
                    } else {
                        let successor_name = successor.metadata.name.clone().unwrap_or_default();
                        done(csv, vec![SideEffect::RequeueSelf, SideEffect::RequeueNamed(successor_name)], None)
                    }
                }
            }
        }

        CsvPhase::Deleting => done(csv, vec![SideEffect::DeleteSelf], None),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use csv_api::apisurface::ApiTriple;
    use csv_api::clock::FixedClock;
    use csv_api::csv::{ApiSurfaceSpec, CsvSpec, CsvStatus, DeploymentStrategy, InstallStrategy};
    use csv_api::operatorgroup::{OperatorGroup, OperatorGroupSpec, OperatorGroupStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use crate::requirements::RequirementCheckResult;

    fn clock() -> FixedClock {
        FixedClock("2026-01-01T00:00:00Z".parse().unwrap())
    }

    fn csv(name: &str, namespace: &str) -> ClusterServiceVersion {
        ClusterServiceVersion {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                ..Default::default()
            },
            spec: CsvSpec {
                install_strategy: InstallStrategy::Deployment(DeploymentStrategy::default()),
                install_modes: vec![csv_api::csv::InstallModeDescriptor {
                    mode_type: csv_api::csv::InstallModeType::OwnNamespace,
                    supported: true,
                }],
                custom_resource_definitions: ApiSurfaceSpec::default(),
                api_service_definitions: ApiSurfaceSpec::default(),
                webhook_definitions: vec![],
                replaces: None,
                min_kube_version: None,
            },
            status: None,
        }
    }

    fn with_phase(mut c: ClusterServiceVersion, phase: CsvPhase, reason: CsvReason) -> ClusterServiceVersion {
        c.status = Some(CsvStatus { phase, reason, ..Default::default() });
        c
    }

    fn operator_group(namespace: &str) -> OperatorGroup {
        OperatorGroup {
            metadata: ObjectMeta {
                name: Some("og".to_owned()),
                namespace: Some(namespace.to_owned()),
                ..Default::default()
            },
            spec: OperatorGroupSpec { selector: None, target_namespaces: None, static_provided_apis: false },
            status: Some(OperatorGroupStatus { namespaces: vec![namespace.to_owned()] }),
        }
    }

    fn base_world(namespace_csvs: Vec<ClusterServiceVersion>, group: OperatorGroup) -> WorldSnapshot {
        WorldSnapshot {
            namespace_csvs: namespace_csvs
                .into_iter()
                .map(|c| (c.metadata.name.clone().unwrap(), c))
                .collect(),
            operator_groups: vec![group],
            other_groups: vec![],
            requirements: Some(RequirementCheckResult { met: true, rows: vec![] }),
            install_outcome: None,
            check_installed: None,
            api_service_resources_present: true,
            webhooks_present: true,
            should_rotate_cert: false,
            owner_conflict: None,
            webhook_conflict: false,
            predecessor_not_upgradeable: false,
        }
    }

    fn annotated(mut c: ClusterServiceVersion, group: &OperatorGroup) -> ClusterServiceVersion {
        let targets = group.target_namespace_set();
        write_group_annotations(
            &mut c,
            group.metadata.name.as_deref().unwrap(),
            group.metadata.namespace.as_deref().unwrap(),
            &targets,
        );
        c
    }

    #[test]
    fn s1_none_to_pending() {
        let group = operator_group("ns");
        let c = annotated(csv("csv1", "ns"), &group);
        let world = base_world(vec![c.clone()], group);
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out.csv.status.as_ref().unwrap().phase, CsvPhase::Pending);
        assert_eq!(out.csv.status.as_ref().unwrap().reason, CsvReason::RequirementsUnknown);
    }

    #[test]
    fn s2_pending_to_install_ready() {
        let group = operator_group("ns");
        let c = annotated(
            with_phase(csv("csv1", "ns"), CsvPhase::Pending, CsvReason::RequirementsUnknown),
            &group,
        );
        let world = base_world(vec![c.clone()], group);
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out.csv.status.as_ref().unwrap().phase, CsvPhase::InstallReady);
        assert_eq!(out.csv.status.as_ref().unwrap().reason, CsvReason::RequirementsMet);
        assert!(out.error.is_none());
    }

    #[test]
    fn s3_install_ready_to_installing() {
        let group = operator_group("ns");
        let c = annotated(
            with_phase(csv("csv1", "ns"), CsvPhase::InstallReady, CsvReason::RequirementsMet),
            &group,
        );
        let mut world = base_world(vec![c.clone()], group);
        world.install_outcome = Some(Ok(()));
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out.csv.status.as_ref().unwrap().phase, CsvPhase::Installing);
        assert_eq!(out.csv.status.as_ref().unwrap().reason, CsvReason::InstallSuccessful);
        assert!(out.effects.contains(&SideEffect::RequeueSelf));
    }

    #[test]
    fn s4_installing_to_succeeded() {
        let group = operator_group("ns");
        let c = annotated(
            with_phase(csv("csv1", "ns"), CsvPhase::Installing, CsvReason::InstallSuccessful),
            &group,
        );
        let mut world = base_world(vec![c.clone()], group);
        world.check_installed = Some(Ok(true));
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out.csv.status.as_ref().unwrap().phase, CsvPhase::Succeeded);
    }

    #[test]
    fn s5_succeeded_replacing_then_deleting() {
        let group = operator_group("ns");
        let csv1 = annotated(
            with_phase(csv("csv1", "ns"), CsvPhase::Succeeded, CsvReason::InstallSuccessful),
            &group,
        );
        let mut csv2_spec = csv("csv2", "ns");
        csv2_spec.spec.replaces = Some("csv1".to_owned());
        let csv2 = annotated(
            with_phase(csv2_spec, CsvPhase::Succeeded, CsvReason::InstallSuccessful),
            &group,
        );

        let world = base_world(vec![csv1.clone(), csv2.clone()], group.clone());
        let out1 = transition(&csv1, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out1.csv.status.as_ref().unwrap().phase, CsvPhase::Replacing);
        assert_eq!(out1.csv.status.as_ref().unwrap().reason, CsvReason::BeingReplaced);

        // second sync: csv1 is Replacing, is earliest, successor csv2 is Succeeded -> Deleting
        let world2 = base_world(vec![out1.csv.clone(), csv2.clone()], group);
        let out2 = transition(&out1.csv, &world2, &clock(), &TransitionConfig::default());
        assert_eq!(out2.csv.status.as_ref().unwrap().phase, CsvPhase::Deleting);
        assert_eq!(out2.csv.status.as_ref().unwrap().reason, CsvReason::Replaced);

        // third sync: Deleting always issues DeleteSelf
        let world3 = base_world(vec![out2.csv.clone(), csv2], group_dummy());
        let out3 = transition(&out2.csv, &world3, &clock(), &TransitionConfig::default());
        assert!(out3.effects.contains(&SideEffect::DeleteSelf));
    }

    fn group_dummy() -> OperatorGroup {
        operator_group("ns")
    }

    #[test]
    fn s6_crd_owner_conflict() {
        let group = operator_group("ns");
        let c = annotated(
            with_phase(csv("csv2", "ns"), CsvPhase::Pending, CsvReason::RequirementsUnknown),
            &group,
        );
        let mut world = base_world(vec![c.clone()], group);
        world.owner_conflict = Some(crate::world::OwnerConflict {
            owner_csv_name: "csv1".to_owned(),
            is_api_service: false,
        });
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out.csv.status.as_ref().unwrap().phase, CsvPhase::Failed);
        assert_eq!(out.csv.status.as_ref().unwrap().reason, CsvReason::OwnerConflict);
    }

    #[test]
    fn invariant_copy_never_transitions() {
        let group = operator_group("ns");
        let mut c = annotated(csv("copy1", "target"), &group);
        c.status = Some(CsvStatus { reason: CsvReason::Copied, ..Default::default() });
        let world = base_world(vec![c.clone()], group);
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out.csv.status.unwrap().reason, CsvReason::Copied);
        assert!(out.effects.is_empty());
        assert!(out.error.is_none());
    }

    #[test]
    fn invariant_idempotence_under_unchanged_world() {
        let group = operator_group("ns");
        let c = annotated(
            with_phase(csv("csv1", "ns"), CsvPhase::Pending, CsvReason::RequirementsUnknown),
            &group,
        );
        let world = base_world(vec![c.clone()], group);
        let once = transition(&c, &world, &clock(), &TransitionConfig::default());
        let twice = transition(&once.csv, &world, &clock(), &TransitionConfig::default());
        let s1 = once.csv.status.unwrap();
        let s2 = twice.csv.status.unwrap();
        assert_eq!(s1.phase, s2.phase);
        assert_eq!(s1.reason, s2.reason);
        assert_eq!(s1.message, s2.message);
    }

    #[test]
    fn no_operator_group_fails() {
        let c = csv("csv1", "ns");
        let world = WorldSnapshot { operator_groups: vec![], ..base_world(vec![c.clone()], operator_group("ns")) };
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out.csv.status.as_ref().unwrap().phase, CsvPhase::Failed);
        assert_eq!(out.csv.status.as_ref().unwrap().reason, CsvReason::NoOperatorGroup);
    }

    #[test]
    fn too_many_operator_groups_fails() {
        let c = csv("csv1", "ns");
        let group = operator_group("ns");
        let world = WorldSnapshot {
            operator_groups: vec![group.clone(), group],
            ..base_world(vec![c.clone()], operator_group("ns"))
        };
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out.csv.status.as_ref().unwrap().reason, CsvReason::TooManyOperatorGroups);
    }

    #[test]
    fn failed_component_no_retry_is_a_fast_exit() {
        let group = operator_group("ns");
        let c = annotated(
            with_phase(csv("csv1", "ns"), CsvPhase::Failed, CsvReason::ComponentFailedNoRetry),
            &group,
        );
        let world = base_world(vec![c.clone()], group);
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        assert_eq!(out.csv.status.unwrap().reason, CsvReason::ComponentFailedNoRetry);
        assert!(out.effects.is_empty());
    }

    #[test]
    fn api_label_is_set_on_provided_crd() {
        let group = operator_group("ns");
        let mut c = annotated(csv("csv1", "ns"), &group);
        c.spec.custom_resource_definitions = ApiSurfaceSpec {
            owned: vec![ApiTriple::new("example.com", "v1", "Widget")],
            required: vec![],
        };
        let world = base_world(vec![c.clone()], group);
        let out = transition(&c, &world, &clock(), &TransitionConfig::default());
        let triple = ApiTriple::new("example.com", "v1", "Widget");
        let key = api_label_key(&triple);
        assert_eq!(
            out.csv.metadata.labels.unwrap().get(&key).map(String::as_str),
            Some(API_LABEL_VALUE_PROVIDED)
        );
    }
}
