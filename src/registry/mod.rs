//! # Orchestration Registry
//!
//! Registration of orchestration descriptions declared by deployed hosts.
//!
//! - [`OrchestrationRegister`]: register, update, deregister and synchronize descriptions
//! - [`breaking_changes`]: decides which redefinitions need a new version

pub mod breaking_changes;
pub mod orchestration_register;

pub use breaking_changes::{
    any_refreshable_property_has_changed, get_properties_with_breaking_changes, ChangedProperty,
    StepField,
};
pub use orchestration_register::{OrchestrationRegister, SynchronizationSummary};
