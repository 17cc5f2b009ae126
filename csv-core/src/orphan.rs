//! L9 — Orphan Collector: pure decision given an owner lookup result, per
//! spec.md §4.6.

/// Result of looking up the CSV an owner-label triple points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerLookup {
    Found,
    NotFound,
    LookupError,
}

/// What the Orphan Collector should do with the cluster-scoped object this
/// tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanOutcome {
    /// Owner CSV is gone; delete the object.
    Delete,
    /// Owner CSV is present; wait and re-check later.
    Retry,
    /// The lookup itself failed; propagate the error rather than guessing.
    Propagate,
}

#[must_use]
pub fn decide(lookup: OwnerLookup) -> OrphanOutcome {
    match lookup {
        OwnerLookup::NotFound => OrphanOutcome::Delete,
        OwnerLookup::Found => OrphanOutcome::Retry,
        OwnerLookup::LookupError => OrphanOutcome::Propagate,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_owner_deletes() {
        assert_eq!(decide(OwnerLookup::NotFound), OrphanOutcome::Delete);
    }

    #[test]
    fn present_owner_waits() {
        assert_eq!(decide(OwnerLookup::Found), OrphanOutcome::Retry);
    }

    #[test]
    fn lookup_error_propagates() {
        assert_eq!(decide(OwnerLookup::LookupError), OrphanOutcome::Propagate);
    }
}
