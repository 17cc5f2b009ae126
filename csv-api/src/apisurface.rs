use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 128-bit FNV-1a offset basis and prime, used by [`ApiTriple::label_hash`].
const FNV_OFFSET_BASIS: u128 = 0x6c62272e07bb014262b821756295c58d;
const FNV_PRIME: u128 = 0x0000_0000_0100_0000_0000_0000_0000_013B;

fn fnv1a_128(bytes: &[u8]) -> u128 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u128::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A `(group, version, kind)` tuple, optionally carrying the CRD/APIService
/// plural form for lookups against the store. Equality and ordering ignore
/// `plural` so two triples that differ only in casing of the plural field
/// are still considered the same API surface member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiTriple {
    pub group: String,
    pub version: String,
    pub kind: String,
    #[serde(default)]
    pub plural: String,
}

impl ApiTriple {
    #[must_use]
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: String::new(),
        }
    }

    /// Strips the plural form, keeping only the identity triple.
    #[must_use]
    pub fn strip_plural(&self) -> Self {
        Self {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: self.kind.clone(),
            plural: String::new(),
        }
    }

    /// 20 hex character FNV-1a fingerprint used in `olm.api.<hash>` label
    /// keys, matching spec.md §6's `olm.api.<20-hex-char-fnv>` wire format.
    /// Hashes the 128-bit FNV-1a offset basis/prime over `group/version/Kind`
    /// and renders the full 128-bit digest as 20 lowercase hex characters
    /// (80 of the 128 bits — the leading digits, truncated the same way the
    /// label-key width is fixed).
    #[must_use]
    pub fn label_hash(&self) -> String {
        let digest = fnv1a_128(self.canonical().as_bytes());
        format!("{digest:032x}")[..20].to_string()
    }

    /// Canonical `group/version/Kind` rendering used in the
    /// `olm.providedAPIs` annotation.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}/{}/{}", self.group, self.version, self.kind)
    }
}

impl PartialEq for ApiTriple {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group && self.version == other.version && self.kind == other.kind
    }
}
impl Eq for ApiTriple {}

impl PartialOrd for ApiTriple {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ApiTriple {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.group, &self.version, &self.kind).cmp(&(&other.group, &other.version, &other.kind))
    }
}

impl fmt::Display for ApiTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// An unordered set of `(group, version, kind)` tuples: a CSV's provided or
/// required API surface, or an OperatorGroup's advertised surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiSurface(BTreeSet<ApiTriple>);

impl ApiSurface {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    #[must_use]
    pub fn from_triples(triples: impl IntoIterator<Item = ApiTriple>) -> Self {
        Self(triples.into_iter().map(|t| t.strip_plural()).collect())
    }

    #[must_use]
    pub fn contains(&self, triple: &ApiTriple) -> bool {
        self.0.contains(&triple.strip_plural())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApiTriple> {
        self.0.iter()
    }

    /// `self ⊆ other`
    #[must_use]
    pub fn is_subset_of(&self, other: &ApiSurface) -> bool {
        self.0.is_subset(&other.0)
    }

    /// `self ⊇ other` and `self != other`
    #[must_use]
    pub fn strictly_contains(&self, other: &ApiSurface) -> bool {
        other.0.is_subset(&self.0) && self.0 != other.0
    }

    #[must_use]
    pub fn union(&self, other: &ApiSurface) -> ApiSurface {
        ApiSurface(self.0.union(&other.0).cloned().collect())
    }

    #[must_use]
    pub fn difference(&self, other: &ApiSurface) -> ApiSurface {
        ApiSurface(self.0.difference(&other.0).cloned().collect())
    }

    #[must_use]
    pub fn intersection(&self, other: &ApiSurface) -> ApiSurface {
        ApiSurface(self.0.intersection(&other.0).cloned().collect())
    }

    /// Canonical `olm.providedAPIs` annotation encoding: sorted by
    /// `(group, version, kind)`, joined with `,`. `BTreeSet`'s iteration
    /// order already matches `ApiTriple`'s `Ord` impl, so this is a
    /// straight map+join with no extra sort step.
    #[must_use]
    pub fn to_annotation(&self) -> String {
        self.0
            .iter()
            .map(ApiTriple::canonical)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses the `olm.providedAPIs` annotation value back into a surface.
    /// Malformed entries (not exactly `group/version/Kind`) are skipped,
    /// matching the tolerant-read behavior expected of annotation parsing
    /// at a cluster's trust boundary.
    #[must_use]
    pub fn from_annotation(value: &str) -> Self {
        let mut set = BTreeSet::new();
        for entry in value.split(',') {
            if entry.is_empty() {
                continue;
            }
            let mut parts = entry.splitn(3, '/');
            if let (Some(group), Some(version), Some(kind)) =
                (parts.next(), parts.next(), parts.next())
            {
                set.insert(ApiTriple::new(group, version, kind));
            }
        }
        Self(set)
    }
}

impl FromIterator<ApiTriple> for ApiSurface {
    fn from_iter<I: IntoIterator<Item = ApiTriple>>(iter: I) -> Self {
        Self::from_triples(iter)
    }
}

#[cfg(test)]
mod test {
    use super::{ApiSurface, ApiTriple};

    fn t(kind: &str) -> ApiTriple {
        ApiTriple::new("example.com", "v1", kind)
    }

    #[test]
    fn annotation_roundtrips() {
        let surface = ApiSurface::from_triples([t("Widget"), t("Gadget")]);
        let rendered = surface.to_annotation();
        assert_eq!(rendered, "example.com/v1/Gadget,example.com/v1/Widget");
        assert_eq!(ApiSurface::from_annotation(&rendered), surface);
    }

    #[test]
    fn two_surfaces_with_same_members_produce_identical_annotation() {
        let a = ApiSurface::from_triples([t("Widget"), t("Gadget")]);
        let b = ApiSurface::from_triples([t("Gadget"), t("Widget")]);
        assert_eq!(a.to_annotation(), b.to_annotation());
    }

    #[test]
    fn subset_and_strict_contains() {
        let small = ApiSurface::from_triples([t("Widget")]);
        let big = ApiSurface::from_triples([t("Widget"), t("Gadget")]);
        assert!(small.is_subset_of(&big));
        assert!(!small.is_subset_of(&ApiSurface::new()));
        assert!(big.strictly_contains(&small));
        assert!(!big.strictly_contains(&big));
    }

    #[test]
    fn label_hash_is_20_hex_chars_and_stable() {
        let a = t("Widget").label_hash();
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, t("Widget").label_hash());
        assert_ne!(a, t("Gadget").label_hash());
    }

    #[test]
    fn malformed_annotation_entries_are_skipped() {
        let surface = ApiSurface::from_annotation("bad-entry,example.com/v1/Widget");
        assert_eq!(surface.len(), 1);
        assert!(surface.contains(&t("Widget")));
    }
}
