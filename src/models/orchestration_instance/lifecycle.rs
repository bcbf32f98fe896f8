use super::operating_identity::OperatingIdentity;
use crate::error::{ProcessManagerError, Result};
use crate::state_machine::{
    InstanceEvent, OrchestrationInstanceLifecycleState, OrchestrationInstanceStateMachine,
    OrchestrationInstanceTerminationState,
};
use chrono::{DateTime, Utc};

/// Lifecycle of an orchestration instance.
///
/// Every transition is checked against [`OrchestrationInstanceStateMachine`] before
/// any field changes, so a rejected transition leaves the lifecycle untouched.
/// Callers that may be retried should check the current state first; the
/// transition methods themselves never treat a repeated call as a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationInstanceLifecycle {
    pub(crate) state: OrchestrationInstanceLifecycleState,
    pub(crate) termination_state: Option<OrchestrationInstanceTerminationState>,
    pub(crate) created_by: OperatingIdentity,
    pub(crate) canceled_by: Option<OperatingIdentity>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) scheduled_to_run_at: Option<DateTime<Utc>>,
    pub(crate) queued_at: Option<DateTime<Utc>>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) terminated_at: Option<DateTime<Utc>>,
}

impl OrchestrationInstanceLifecycle {
    /// Starts Pending, or Scheduled when `run_at` is given.
    pub(crate) fn new(
        created_by: OperatingIdentity,
        now: DateTime<Utc>,
        run_at: Option<DateTime<Utc>>,
    ) -> Self {
        let state = match run_at {
            Some(_) => OrchestrationInstanceLifecycleState::Scheduled,
            None => OrchestrationInstanceLifecycleState::Pending,
        };

        Self {
            state,
            termination_state: None,
            created_by,
            canceled_by: None,
            created_at: now,
            scheduled_to_run_at: run_at,
            queued_at: None,
            started_at: None,
            terminated_at: None,
        }
    }

    pub fn state(&self) -> OrchestrationInstanceLifecycleState {
        self.state
    }

    pub fn termination_state(&self) -> Option<OrchestrationInstanceTerminationState> {
        self.termination_state
    }

    pub fn created_by(&self) -> &OperatingIdentity {
        &self.created_by
    }

    pub fn canceled_by(&self) -> Option<&OperatingIdentity> {
        self.canceled_by.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn scheduled_to_run_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_to_run_at
    }

    pub fn queued_at(&self) -> Option<DateTime<Utc>> {
        self.queued_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn terminated_at(&self) -> Option<DateTime<Utc>> {
        self.terminated_at
    }

    pub fn is_scheduled(&self) -> bool {
        self.state == OrchestrationInstanceLifecycleState::Scheduled
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn transition_to_queued(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(InstanceEvent::Queue)?;
        self.queued_at = Some(now);
        Ok(())
    }

    pub fn transition_to_running(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(InstanceEvent::Start)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn transition_to_succeeded(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.terminate(InstanceEvent::Succeed, now)
    }

    pub fn transition_to_failed(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.terminate(InstanceEvent::Fail, now)
    }

    /// Operator cancellation; only possible before the instance is queued.
    pub fn transition_to_user_canceled(
        &mut self,
        now: DateTime<Utc>,
        canceled_by: OperatingIdentity,
    ) -> Result<()> {
        self.terminate(InstanceEvent::Cancel, now)?;
        self.canceled_by = Some(canceled_by);
        Ok(())
    }

    /// Terminate with an explicit outcome.
    pub fn transition_to_terminated(
        &mut self,
        now: DateTime<Utc>,
        termination_state: OrchestrationInstanceTerminationState,
        canceled_by: Option<OperatingIdentity>,
    ) -> Result<()> {
        match termination_state {
            OrchestrationInstanceTerminationState::Succeeded => self.transition_to_succeeded(now),
            OrchestrationInstanceTerminationState::Failed => self.transition_to_failed(now),
            OrchestrationInstanceTerminationState::UserCanceled => match canceled_by {
                Some(identity) => self.transition_to_user_canceled(now, identity),
                None => Err(ProcessManagerError::ValidationError(
                    "A user cancellation requires the canceling identity".to_string(),
                )),
            },
        }
    }

    fn terminate(&mut self, event: InstanceEvent, now: DateTime<Utc>) -> Result<()> {
        self.apply(event)?;
        self.termination_state = event.termination_state();
        self.terminated_at = Some(now);
        Ok(())
    }

    fn apply(&mut self, event: InstanceEvent) -> Result<()> {
        self.state = OrchestrationInstanceStateMachine::determine_target_state(self.state, event)?;
        Ok(())
    }
}
