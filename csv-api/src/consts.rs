//! Wire-format constants: annotation and label keys the core reads and
//! writes verbatim. Every key named in spec.md §6 has exactly one constant
//! here; nothing else in the crate spells these out as string literals.

/// CSV annotation naming the OperatorGroup it is a member of.
pub const ANNOTATION_OPERATOR_GROUP: &str = "olm.operatorGroup";
/// CSV annotation naming the namespace of that OperatorGroup.
pub const ANNOTATION_OPERATOR_NAMESPACE: &str = "olm.operatorNamespace";
/// CSV (and Deployment-template) annotation: comma-joined sorted target
/// namespaces, `""` meaning all-namespaces.
pub const ANNOTATION_TARGET_NAMESPACES: &str = "olm.targetNamespaces";
/// OperatorGroup annotation: canonical `g/v/Kind,…` sorted provided APIs.
pub const ANNOTATION_PROVIDED_APIS: &str = "olm.providedAPIs";

/// Owner label triple used for cross-namespace/cluster-scoped ownership
/// where a native owner reference cannot be used.
pub const LABEL_OWNER_NAME: &str = "olm.owner";
pub const LABEL_OWNER_NAMESPACE: &str = "olm.owner.namespace";
pub const LABEL_OWNER_KIND: &str = "olm.owner.kind";

/// Prefix for the per-`(group,version,kind)` API labels carried on a CSV:
/// the full key is `{API_LABEL_PREFIX}{20-hex-char-hash}`.
pub const API_LABEL_PREFIX: &str = "olm.api.";

/// Value written for a provided API label.
pub const API_LABEL_VALUE_PROVIDED: &str = "provided";
/// Value written for a required API label.
pub const API_LABEL_VALUE_REQUIRED: &str = "required";

/// Kind string used in the owner-label triple and in owner references when
/// the owner is a ClusterServiceVersion.
pub const KIND_CLUSTER_SERVICE_VERSION: &str = "ClusterServiceVersion";

/// Field manager used for server-side-apply writes, matching the pattern
/// of the teacher's `FIELD_MANAGER` constant used on every `Patch::Apply`.
pub const FIELD_MANAGER: &str = "csv-controller";

/// Status message written onto every copied CSV.
pub const COPIED_CSV_MESSAGE: &str = "CSV copied to target namespace";
