use super::values::CustomState;
use crate::error::Result;
use crate::models::orchestration_description::StepDescription;
use crate::state_machine::{
    StepEvent, StepInstanceLifecycleState, StepInstanceStateMachine, StepInstanceTerminationState,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepInstanceId(Uuid);

impl StepInstanceId {
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

impl Default for StepInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StepInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepInstanceLifecycle {
    pub(crate) state: StepInstanceLifecycleState,
    pub(crate) termination_state: Option<StepInstanceTerminationState>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) terminated_at: Option<DateTime<Utc>>,
}

impl StepInstanceLifecycle {
    fn new() -> Self {
        Self {
            state: StepInstanceLifecycleState::Pending,
            termination_state: None,
            started_at: None,
            terminated_at: None,
        }
    }

    pub fn state(&self) -> StepInstanceLifecycleState {
        self.state
    }

    pub fn termination_state(&self) -> Option<StepInstanceTerminationState> {
        self.termination_state
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn terminated_at(&self) -> Option<DateTime<Utc>> {
        self.terminated_at
    }
}

/// Execution record of one declared step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInstance {
    pub(crate) id: StepInstanceId,
    pub(crate) sequence: i32,
    pub(crate) description: String,
    pub(crate) can_be_skipped: bool,
    pub(crate) lifecycle: StepInstanceLifecycle,
    pub(crate) custom_state: CustomState,
}

impl StepInstance {
    pub(crate) fn from_description(step: &StepDescription) -> Self {
        Self {
            id: StepInstanceId::new(),
            sequence: step.sequence(),
            description: step.description().to_string(),
            can_be_skipped: step.can_be_skipped(),
            lifecycle: StepInstanceLifecycle::new(),
            custom_state: CustomState::default(),
        }
    }

    pub fn id(&self) -> StepInstanceId {
        self.id
    }

    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn can_be_skipped(&self) -> bool {
        self.can_be_skipped
    }

    pub fn lifecycle(&self) -> &StepInstanceLifecycle {
        &self.lifecycle
    }

    pub fn custom_state(&self) -> &CustomState {
        &self.custom_state
    }

    pub fn set_custom_state(&mut self, custom_state: CustomState) {
        self.custom_state = custom_state;
    }

    pub fn is_terminated(&self) -> bool {
        self.lifecycle.state.is_terminal()
    }

    pub fn transition_to_running(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(StepEvent::Start)?;
        self.lifecycle.started_at = Some(now);
        Ok(())
    }

    /// Succeeded and Failed require a running step; Skipped requires a pending, skippable one.
    pub fn transition_to_terminated(
        &mut self,
        now: DateTime<Utc>,
        termination_state: StepInstanceTerminationState,
    ) -> Result<()> {
        self.apply(StepEvent::terminating_with(termination_state))?;
        self.lifecycle.termination_state = Some(termination_state);
        self.lifecycle.terminated_at = Some(now);
        Ok(())
    }

    fn apply(&mut self, event: StepEvent) -> Result<()> {
        self.lifecycle.state = StepInstanceStateMachine::determine_target_state(
            self.lifecycle.state,
            event,
            self.can_be_skipped,
        )?;
        Ok(())
    }
}
