// State machine module for orchestration lifecycles
//
// Pure transition tables for orchestration instances and their steps. The
// lifecycle value objects in `models` consult these tables before mutating
// any state, so every illegal transition fails the same way.

pub mod events;
pub mod instance_state_machine;
pub mod states;
pub mod step_state_machine;

// Re-export main types for convenient access
pub use events::{InstanceEvent, StepEvent};
pub use instance_state_machine::OrchestrationInstanceStateMachine;
pub use states::{
    OrchestrationInstanceLifecycleState, OrchestrationInstanceTerminationState,
    StepInstanceLifecycleState, StepInstanceTerminationState,
};
pub use step_state_machine::StepInstanceStateMachine;
