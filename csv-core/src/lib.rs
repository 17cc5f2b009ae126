//! Pure reconciliation logic for the CSV lifecycle: no I/O, no `kube`
//! dependency. Every public function here takes already-fetched state and
//! returns a decision or a new object snapshot; the controller binary is
//! responsible for the I/O that assembles the inputs and executes the
//! outputs.

pub mod copy;
pub mod effects;
pub mod gating;
pub mod intersection;
pub mod operatorgroup;
pub mod orphan;
pub mod prune;
pub mod replacement;
pub mod requirements;
pub mod transition;
pub mod world;

pub use effects::SideEffect;
pub use gating::{find_owner_conflict, webhook_conflict};
pub use intersection::{GroupSurface, IntersectionOutcome};
pub use orphan::{OrphanOutcome, OwnerLookup};
pub use requirements::{ApiServiceState, CrdState, PermissionState, RequirementCheckResult, RequirementInputs};
pub use transition::{transition, TransitionOutput};
pub use world::{OwnerConflict, TransitionConfig, WorldSnapshot};
