//! # Progress Repository
//!
//! Transition helpers for workflow activities. Every workflow moves its
//! instance and steps through the same Pending, Running, Terminated dance; the
//! helpers here wrap that dance so a replayed activity call is harmless.
//!
//! Each helper reads the instance fresh, checks whether the requested
//! transition already happened, and otherwise applies it and commits in its
//! own unit of work. Repeating a call with the same outcome is a no-op.
//! Asking for a different outcome than the one already recorded fails with
//! an invalid-operation error, as does any transition the lifecycle rejects.

use super::instance_repository::OrchestrationInstanceRepository;
use crate::clock::Clock;
use crate::error::{ProcessManagerError, Result};
use crate::logging::{log_instance_operation, log_step_operation};
use crate::models::{CustomState, OrchestrationInstance, OrchestrationInstanceId};
use crate::state_machine::{
    OrchestrationInstanceLifecycleState, OrchestrationInstanceTerminationState,
    StepInstanceLifecycleState, StepInstanceTerminationState,
};
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct ProgressRepository {
    repository: OrchestrationInstanceRepository,
    clock: Arc<dyn Clock>,
}

impl ProgressRepository {
    pub fn new(repository: OrchestrationInstanceRepository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Move a queued instance to Running. Already running or terminated instances are left alone.
    #[instrument(skip(self))]
    pub async fn start_instance_if_queued(
        &self,
        id: OrchestrationInstanceId,
    ) -> Result<OrchestrationInstance> {
        let mut instance = self.repository.get(id).await?;
        match instance.lifecycle().state() {
            OrchestrationInstanceLifecycleState::Running
            | OrchestrationInstanceLifecycleState::Terminated => {
                debug!(instance_id = %id, "Instance already started");
                Ok(instance)
            }
            _ => {
                instance.lifecycle_mut().transition_to_running(self.clock.now())?;
                self.commit(&mut instance).await?;
                log_instance_operation("start_instance", &id.to_string(), None, "running", None);
                Ok(instance)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn terminate_instance_and_commit(
        &self,
        id: OrchestrationInstanceId,
        termination_state: OrchestrationInstanceTerminationState,
    ) -> Result<OrchestrationInstance> {
        let mut instance = self.repository.get(id).await?;
        if instance.lifecycle().is_terminated() {
            return match instance.lifecycle().termination_state() {
                Some(current) if current == termination_state => Ok(instance),
                current => Err(ProcessManagerError::InvalidOperation(format!(
                    "Orchestration instance {id} is already terminated as {}",
                    current.map(|state| state.to_string()).unwrap_or_default()
                ))),
            };
        }

        instance
            .lifecycle_mut()
            .transition_to_terminated(self.clock.now(), termination_state, None)?;
        self.commit(&mut instance).await?;

        log_instance_operation(
            "terminate_instance",
            &id.to_string(),
            None,
            &termination_state.to_string(),
            None,
        );
        Ok(instance)
    }

    /// Move a pending step to Running. Already running or terminated steps are left alone.
    #[instrument(skip(self))]
    pub async fn start_step_if_pending(
        &self,
        id: OrchestrationInstanceId,
        step_sequence: i32,
    ) -> Result<OrchestrationInstance> {
        let mut instance = self.repository.get(id).await?;
        let now = self.clock.now();

        let step = instance.step_mut(step_sequence)?;
        if step.lifecycle().state() != StepInstanceLifecycleState::Pending {
            debug!(instance_id = %id, step_sequence, "Step already started");
            return Ok(instance);
        }
        step.transition_to_running(now)?;

        self.commit(&mut instance).await?;
        log_step_operation("start_step", &id.to_string(), step_sequence, "running", None);
        Ok(instance)
    }

    #[instrument(skip(self))]
    pub async fn terminate_step_and_commit(
        &self,
        id: OrchestrationInstanceId,
        step_sequence: i32,
        termination_state: StepInstanceTerminationState,
    ) -> Result<OrchestrationInstance> {
        let mut instance = self.repository.get(id).await?;
        let now = self.clock.now();

        let step = instance.step_mut(step_sequence)?;
        if step.is_terminated() {
            return match step.lifecycle().termination_state() {
                Some(current) if current == termination_state => Ok(instance),
                current => Err(ProcessManagerError::InvalidOperation(format!(
                    "Step {step_sequence} of orchestration instance {id} is already terminated as {}",
                    current.map(|state| state.to_string()).unwrap_or_default()
                ))),
            };
        }
        step.transition_to_terminated(now, termination_state)?;

        self.commit(&mut instance).await?;
        log_step_operation(
            "terminate_step",
            &id.to_string(),
            step_sequence,
            &termination_state.to_string(),
            None,
        );
        Ok(instance)
    }

    pub async fn set_instance_custom_state(
        &self,
        id: OrchestrationInstanceId,
        custom_state: CustomState,
    ) -> Result<OrchestrationInstance> {
        let mut instance = self.repository.get(id).await?;
        instance.set_custom_state(custom_state);
        self.commit(&mut instance).await?;
        Ok(instance)
    }

    pub async fn set_step_custom_state(
        &self,
        id: OrchestrationInstanceId,
        step_sequence: i32,
        custom_state: CustomState,
    ) -> Result<OrchestrationInstance> {
        let mut instance = self.repository.get(id).await?;
        instance.step_mut(step_sequence)?.set_custom_state(custom_state);
        self.commit(&mut instance).await?;
        Ok(instance)
    }

    async fn commit(&self, instance: &mut OrchestrationInstance) -> Result<()> {
        let mut unit_of_work = self.repository.unit_of_work();
        unit_of_work.update_instance(instance);
        unit_of_work.commit().await
    }
}
