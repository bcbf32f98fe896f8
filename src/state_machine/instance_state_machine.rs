use super::events::InstanceEvent;
use super::states::OrchestrationInstanceLifecycleState;
use crate::constants::entities;
use crate::error::{ProcessManagerError, Result};

/// Transition table for orchestration instances.
///
/// ```text
/// Pending ──┐
///           ├─ Queue ─> Queued ─ Start ─> Running ─ Succeed|Fail ─> Terminated
/// Scheduled ┘
/// Pending|Scheduled ─ Cancel ─> Terminated
/// ```
///
/// Transitions only move forward; Terminated is absorbing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestrationInstanceStateMachine;

impl OrchestrationInstanceStateMachine {
    /// Determine the target state for an event, failing on any illegal transition
    pub fn determine_target_state(
        current_state: OrchestrationInstanceLifecycleState,
        event: InstanceEvent,
    ) -> Result<OrchestrationInstanceLifecycleState> {
        use OrchestrationInstanceLifecycleState as State;

        let target = match (current_state, event) {
            (State::Pending | State::Scheduled, InstanceEvent::Queue) => State::Queued,
            (State::Queued, InstanceEvent::Start) => State::Running,
            (State::Running, InstanceEvent::Succeed | InstanceEvent::Fail) => State::Terminated,
            (State::Pending | State::Scheduled, InstanceEvent::Cancel) => State::Terminated,
            (from_state, _) => {
                return Err(ProcessManagerError::StateTransitionError {
                    entity: entities::ORCHESTRATION_INSTANCE,
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }
}
