use super::states::{OrchestrationInstanceTerminationState, StepInstanceTerminationState};
use serde::{Deserialize, Serialize};

/// Events that can trigger orchestration instance state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstanceEvent {
    /// Hand the instance to the execution engine
    Queue,
    /// The execution engine started running it
    Start,
    Succeed,
    Fail,
    /// Operator cancellation before the instance was queued
    Cancel,
}

impl InstanceEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Start => "start",
            Self::Succeed => "succeed",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Termination outcome recorded when this event terminates the instance
    pub fn termination_state(&self) -> Option<OrchestrationInstanceTerminationState> {
        match self {
            Self::Succeed => Some(OrchestrationInstanceTerminationState::Succeeded),
            Self::Fail => Some(OrchestrationInstanceTerminationState::Failed),
            Self::Cancel => Some(OrchestrationInstanceTerminationState::UserCanceled),
            Self::Queue | Self::Start => None,
        }
    }
}

/// Events that can trigger step instance state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StepEvent {
    Start,
    Succeed,
    Fail,
    /// Terminate a skippable step without running it
    Skip,
}

impl StepEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Succeed => "succeed",
            Self::Fail => "fail",
            Self::Skip => "skip",
        }
    }

    pub fn termination_state(&self) -> Option<StepInstanceTerminationState> {
        match self {
            Self::Succeed => Some(StepInstanceTerminationState::Succeeded),
            Self::Fail => Some(StepInstanceTerminationState::Failed),
            Self::Skip => Some(StepInstanceTerminationState::Skipped),
            Self::Start => None,
        }
    }

    /// The event that produces the given termination state
    pub fn terminating_with(termination_state: StepInstanceTerminationState) -> Self {
        match termination_state {
            StepInstanceTerminationState::Succeeded => Self::Succeed,
            StepInstanceTerminationState::Failed => Self::Fail,
            StepInstanceTerminationState::Skipped => Self::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_states_of_events() {
        assert_eq!(InstanceEvent::Queue.termination_state(), None);
        assert_eq!(
            InstanceEvent::Cancel.termination_state(),
            Some(OrchestrationInstanceTerminationState::UserCanceled)
        );

        for state in [
            StepInstanceTerminationState::Succeeded,
            StepInstanceTerminationState::Failed,
            StepInstanceTerminationState::Skipped,
        ] {
            assert_eq!(
                StepEvent::terminating_with(state).termination_state(),
                Some(state)
            );
        }
    }
}
