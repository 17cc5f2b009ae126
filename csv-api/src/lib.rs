//! Shared types and external-collaborator trait boundaries for the CSV
//! lifecycle controller: the `ClusterServiceVersion` and `OperatorGroup`
//! custom resources, namespace/API-surface value types, the annotation and
//! label wire contract, and the `ObjectStore` / `Installer` / `CertProvider`
//! traits that keep I/O out of `csv-core`.

pub mod apisurface;
pub mod certs;
pub mod clock;
pub mod consts;
pub mod csv;
pub mod error;
pub mod events;
pub mod installer;
pub mod namespace;
pub mod operatorcondition;
pub mod operatorgroup;
pub mod rbac;
pub mod store;

pub use apisurface::{ApiSurface, ApiTriple};
pub use csv::{ClusterServiceVersion, CsvPhase, CsvReason, CsvSpec, CsvStatus};
pub use error::SyncError;
pub use events::{EventRecorder, NoopEventRecorder};
pub use namespace::NamespaceSet;
pub use operatorcondition::OperatorCondition;
pub use operatorgroup::{OperatorGroup, OperatorGroupSpec, OperatorGroupStatus};
pub use rbac::RBACEnsurer;
pub use store::ObjectStore;
