//! Form instances: lifecycle state, append-only history and persistence.

pub mod store;
pub mod types;
pub mod version;

pub use store::{InstanceStore, RESOURCE_TYPE, VersionedInstance};
pub use types::{
    ConfigurationWarning, Decision, FormInstance, HistoryDecision, HistoryEntry, InstanceStatus,
};
pub use version::{InstanceVersion, VersionError};
