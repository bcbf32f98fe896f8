//! # Orchestration Instance
//!
//! One execution of an [`OrchestrationDescription`]. An instance owns a step
//! instance per declared step, copied when the instance is created, and a
//! lifecycle that only ever moves forward.
//!
//! ## Creation rules
//!
//! - The parameter value must satisfy the description's parameter definition.
//! - Steps requested as skipped must exist and be declared skippable; they are
//!   terminated as Skipped immediately.
//! - A run-at time is only accepted for descriptions that can be scheduled.

pub mod lifecycle;
pub mod operating_identity;
pub mod step_instance;
pub mod values;

pub use lifecycle::OrchestrationInstanceLifecycle;
pub use operating_identity::{Actor, ActorNumber, ActorRole, OperatingIdentity, UserId};
pub use step_instance::{StepInstance, StepInstanceId, StepInstanceLifecycle};
pub use values::{
    ActorMessageId, CustomState, IdempotencyKey, MeteringPointId, ParameterValue, TransactionId,
};

use crate::constants::entities;
use crate::error::{ProcessManagerError, Result};
use crate::models::orchestration_description::{
    OrchestrationDescription, OrchestrationDescriptionId,
};
use crate::models::RowVersion;
use crate::state_machine::StepInstanceTerminationState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrchestrationInstanceId(Uuid);

impl OrchestrationInstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrchestrationInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrchestrationInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationInstance {
    pub(crate) id: OrchestrationInstanceId,
    pub(crate) orchestration_description_id: OrchestrationDescriptionId,
    pub(crate) parameter_value: ParameterValue,
    pub(crate) custom_state: CustomState,
    pub(crate) lifecycle: OrchestrationInstanceLifecycle,
    pub(crate) idempotency_key: Option<IdempotencyKey>,
    pub(crate) actor_message_id: Option<ActorMessageId>,
    pub(crate) transaction_id: Option<TransactionId>,
    pub(crate) metering_point_id: Option<MeteringPointId>,
    pub(crate) steps: Vec<StepInstance>,
    pub(crate) row_version: RowVersion,
}

impl OrchestrationInstance {
    /// Create an instance bound to `description`.
    pub fn create_from_description(
        description: &OrchestrationDescription,
        created_by: OperatingIdentity,
        parameter_value: ParameterValue,
        skip_step_sequences: &BTreeSet<i32>,
        now: DateTime<Utc>,
        run_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        if !description
            .parameter_definition()
            .is_valid_parameter_value(parameter_value.serialized_value())
        {
            return Err(ProcessManagerError::ValidationError(format!(
                "Parameter value does not match the parameter definition of {}",
                description.unique_name()
            )));
        }

        if run_at.is_some() && !description.can_be_scheduled() {
            return Err(ProcessManagerError::InvalidOperation(format!(
                "Orchestration description {} cannot be scheduled",
                description.unique_name()
            )));
        }

        let mut steps: Vec<StepInstance> = description
            .steps()
            .iter()
            .map(StepInstance::from_description)
            .collect();

        for sequence in skip_step_sequences {
            let step = steps
                .iter_mut()
                .find(|step| step.sequence() == *sequence)
                .ok_or_else(|| {
                    ProcessManagerError::ValidationError(format!(
                        "Cannot skip step {sequence}: {} has no such step",
                        description.unique_name()
                    ))
                })?;
            step.transition_to_terminated(now, StepInstanceTerminationState::Skipped)?;
        }

        Ok(Self {
            id: OrchestrationInstanceId::new(),
            orchestration_description_id: description.id(),
            parameter_value,
            custom_state: CustomState::default(),
            lifecycle: OrchestrationInstanceLifecycle::new(created_by, now, run_at),
            idempotency_key: None,
            actor_message_id: None,
            transaction_id: None,
            metering_point_id: None,
            steps,
            row_version: RowVersion::default(),
        })
    }

    pub fn with_idempotency_key(mut self, idempotency_key: Option<IdempotencyKey>) -> Self {
        self.idempotency_key = idempotency_key;
        self
    }

    pub fn with_actor_message_id(mut self, actor_message_id: Option<ActorMessageId>) -> Self {
        self.actor_message_id = actor_message_id;
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: Option<TransactionId>) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    pub fn with_metering_point_id(mut self, metering_point_id: Option<MeteringPointId>) -> Self {
        self.metering_point_id = metering_point_id;
        self
    }

    pub fn id(&self) -> OrchestrationInstanceId {
        self.id
    }

    pub fn orchestration_description_id(&self) -> OrchestrationDescriptionId {
        self.orchestration_description_id
    }

    pub fn parameter_value(&self) -> &ParameterValue {
        &self.parameter_value
    }

    pub fn custom_state(&self) -> &CustomState {
        &self.custom_state
    }

    pub fn set_custom_state(&mut self, custom_state: CustomState) {
        self.custom_state = custom_state;
    }

    pub fn lifecycle(&self) -> &OrchestrationInstanceLifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut OrchestrationInstanceLifecycle {
        &mut self.lifecycle
    }

    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }

    pub fn actor_message_id(&self) -> Option<&ActorMessageId> {
        self.actor_message_id.as_ref()
    }

    pub fn transaction_id(&self) -> Option<&TransactionId> {
        self.transaction_id.as_ref()
    }

    pub fn metering_point_id(&self) -> Option<&MeteringPointId> {
        self.metering_point_id.as_ref()
    }

    pub fn steps(&self) -> &[StepInstance] {
        &self.steps
    }

    pub fn row_version(&self) -> RowVersion {
        self.row_version
    }

    pub(crate) fn set_row_version(&mut self, row_version: RowVersion) {
        self.row_version = row_version;
    }

    /// The step with the given sequence; fails if there is none.
    pub fn step(&self, sequence: i32) -> Result<&StepInstance> {
        self.steps
            .iter()
            .find(|step| step.sequence() == sequence)
            .ok_or_else(|| self.missing_step(sequence))
    }

    pub fn step_mut(&mut self, sequence: i32) -> Result<&mut StepInstance> {
        let missing = self.missing_step(sequence);
        self.steps
            .iter_mut()
            .find(|step| step.sequence() == sequence)
            .ok_or(missing)
    }

    fn missing_step(&self, sequence: i32) -> ProcessManagerError {
        ProcessManagerError::not_found(
            entities::STEP_INSTANCE,
            format!("{} step {sequence}", self.id),
        )
    }
}
