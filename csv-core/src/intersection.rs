use csv_api::ApiSurface;

/// Outcome of the API intersection reconciler (L4). Totality: exactly one
/// of these is returned for any input, per spec.md §8 invariant 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionOutcome {
    NoOp,
    AddApis,
    RemoveApis,
    ApiConflict,
}

/// An OperatorGroup's view as seen by the intersection reconciler: its
/// declared `providedAPIs` surface and its resolved target-namespace set.
pub struct GroupSurface<'a> {
    pub provided: &'a ApiSurface,
    pub targets: &'a csv_api::NamespaceSet,
}

/// L4 — API Intersection Reconciler.
///
/// Pure function: given our provided-API set `ours`, our OperatorGroup's
/// declared surface `our_group`, and the declared surfaces of every other
/// OperatorGroup in the cluster, decides whether our group's annotation
/// needs to grow, shrink, or whether we conflict with a sibling group.
#[must_use]
pub fn reconcile(
    ours: &ApiSurface,
    our_group: &GroupSurface<'_>,
    others: &[GroupSurface<'_>],
) -> IntersectionOutcome {
    let conflict = others.iter().any(|other| {
        other.targets.intersects(our_group.targets) && !other.provided.intersection(ours).is_empty()
    });
    if conflict {
        return IntersectionOutcome::ApiConflict;
    }

    if !ours.is_subset_of(our_group.provided) {
        return IntersectionOutcome::AddApis;
    }
    if our_group.provided.strictly_contains(ours) {
        return IntersectionOutcome::RemoveApis;
    }
    IntersectionOutcome::NoOp
}

#[cfg(test)]
mod test {
    use super::*;
    use csv_api::{ApiTriple, NamespaceSet};

    fn surface(kinds: &[&str]) -> ApiSurface {
        ApiSurface::from_triples(kinds.iter().map(|k| ApiTriple::new("example.com", "v1", *k)))
    }

    #[test]
    fn no_op_when_surfaces_already_match() {
        let ours = surface(&["Widget"]);
        let targets = NamespaceSet::new(["ns1"]);
        let group = GroupSurface { provided: &ours, targets: &targets };
        assert_eq!(reconcile(&ours, &group, &[]), IntersectionOutcome::NoOp);
    }

    #[test]
    fn add_apis_when_we_provide_more_than_declared() {
        let ours = surface(&["Widget", "Gadget"]);
        let declared = surface(&["Widget"]);
        let targets = NamespaceSet::new(["ns1"]);
        let group = GroupSurface { provided: &declared, targets: &targets };
        assert_eq!(reconcile(&ours, &group, &[]), IntersectionOutcome::AddApis);
    }

    #[test]
    fn remove_apis_when_declared_exceeds_what_we_provide() {
        let ours = surface(&["Widget"]);
        let declared = surface(&["Widget", "Gadget"]);
        let targets = NamespaceSet::new(["ns1"]);
        let group = GroupSurface { provided: &declared, targets: &targets };
        assert_eq!(reconcile(&ours, &group, &[]), IntersectionOutcome::RemoveApis);
    }

    #[test]
    fn conflict_with_intersecting_sibling_group() {
        let ours = surface(&["Widget"]);
        let declared = surface(&["Widget"]);
        let our_targets = NamespaceSet::new(["ns1"]);
        let group = GroupSurface { provided: &declared, targets: &our_targets };

        let other_declared = surface(&["Widget"]);
        let other_targets = NamespaceSet::new(["ns1", "ns2"]);
        let other = GroupSurface { provided: &other_declared, targets: &other_targets };

        assert_eq!(
            reconcile(&ours, &group, &[other]),
            IntersectionOutcome::ApiConflict
        );
    }

    #[test]
    fn non_intersecting_sibling_does_not_conflict() {
        let ours = surface(&["Widget"]);
        let declared = surface(&["Widget"]);
        let our_targets = NamespaceSet::new(["ns1"]);
        let group = GroupSurface { provided: &declared, targets: &our_targets };

        let other_declared = surface(&["Widget"]);
        let other_targets = NamespaceSet::new(["ns2"]);
        let other = GroupSurface { provided: &other_declared, targets: &other_targets };

        assert_eq!(reconcile(&ours, &group, &[other]), IntersectionOutcome::NoOp);
    }

    #[test]
    fn static_provided_apis_does_not_affect_conflict_detection() {
        // The reconcile() function itself is staticness-agnostic per
        // spec.md open question: conflict handling ignores staticness;
        // only the caller (transition::apply_intersection) treats
        // Add/Remove differently when the group is static.
        let ours = surface(&["Widget"]);
        let declared = surface(&["Widget"]);
        let our_targets = NamespaceSet::new(["ns1"]);
        let group = GroupSurface { provided: &declared, targets: &our_targets };
        let other_declared = surface(&["Widget"]);
        let other_targets = NamespaceSet::new(["ns1"]);
        let other = GroupSurface { provided: &other_declared, targets: &other_targets };
        assert_eq!(
            reconcile(&ours, &group, &[other]),
            IntersectionOutcome::ApiConflict
        );
    }
}
