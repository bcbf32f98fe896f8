//! # Domain Models
//!
//! Aggregates owned by the process manager:
//!
//! - [`OrchestrationDescription`]: a registered, versioned orchestration definition
//! - [`OrchestrationInstance`]: one execution of a description, with its steps
//!
//! Both aggregate roots carry a [`RowVersion`] used for optimistic concurrency
//! when they are written through a [`crate::database::UnitOfWork`].

pub mod orchestration_description;
pub mod orchestration_instance;
mod row_version;

pub use orchestration_description::{
    OrchestrationDescription, OrchestrationDescriptionId, OrchestrationDescriptionUniqueName,
    ParameterDefinition, StepDescription,
};
pub use orchestration_instance::{
    Actor, ActorMessageId, ActorNumber, ActorRole, CustomState, IdempotencyKey, MeteringPointId,
    OperatingIdentity, OrchestrationInstance, OrchestrationInstanceId,
    OrchestrationInstanceLifecycle, ParameterValue, StepInstance, StepInstanceId,
    StepInstanceLifecycle, TransactionId, UserId,
};
pub use row_version::RowVersion;
