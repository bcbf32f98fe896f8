use super::events::StepEvent;
use super::states::StepInstanceLifecycleState;
use crate::constants::entities;
use crate::error::{ProcessManagerError, Result};

/// Transition table for step instances.
///
/// `Pending -> Running -> Terminated{Succeeded|Failed}`, plus `Pending -> Terminated{Skipped}`
/// for steps declared as skippable.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepInstanceStateMachine;

impl StepInstanceStateMachine {
    pub fn determine_target_state(
        current_state: StepInstanceLifecycleState,
        event: StepEvent,
        can_be_skipped: bool,
    ) -> Result<StepInstanceLifecycleState> {
        use StepInstanceLifecycleState as State;

        let target = match (current_state, event) {
            (State::Pending, StepEvent::Start) => State::Running,
            (State::Running, StepEvent::Succeed | StepEvent::Fail) => State::Terminated,
            (State::Pending, StepEvent::Skip) if can_be_skipped => State::Terminated,
            (State::Pending, StepEvent::Skip) => {
                return Err(ProcessManagerError::InvalidOperation(
                    "step cannot be skipped: it is not declared as skippable".to_string(),
                ))
            }
            (from_state, _) => {
                return Err(ProcessManagerError::StateTransitionError {
                    entity: entities::STEP_INSTANCE,
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }
}
