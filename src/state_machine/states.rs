use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestration instance lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationInstanceLifecycleState {
    /// Created, not yet eligible to run
    Pending,
    /// Created with a ScheduledToRunAt, waiting for that time
    Scheduled,
    /// Ready, waiting for the execution engine to pick it up
    Queued,
    /// Picked up by the execution engine
    Running,
    /// Finished; the termination state tells how
    Terminated,
}

impl OrchestrationInstanceLifecycleState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Check if the instance has not been handed to the execution engine yet
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Pending | Self::Scheduled)
    }
}

impl fmt::Display for OrchestrationInstanceLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

impl std::str::FromStr for OrchestrationInstanceLifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "scheduled" => Ok(Self::Scheduled),
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "terminated" => Ok(Self::Terminated),
            _ => Err(format!("Invalid orchestration instance state: {s}")),
        }
    }
}

/// How a terminated orchestration instance ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationInstanceTerminationState {
    Succeeded,
    Failed,
    UserCanceled,
}

impl fmt::Display for OrchestrationInstanceTerminationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::UserCanceled => write!(f, "user_canceled"),
        }
    }
}

impl std::str::FromStr for OrchestrationInstanceTerminationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "user_canceled" => Ok(Self::UserCanceled),
            _ => Err(format!("Invalid orchestration instance termination state: {s}")),
        }
    }
}

/// Step instance lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepInstanceLifecycleState {
    Pending,
    Running,
    Terminated,
}

impl StepInstanceLifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for StepInstanceLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

impl std::str::FromStr for StepInstanceLifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "terminated" => Ok(Self::Terminated),
            _ => Err(format!("Invalid step instance state: {s}")),
        }
    }
}

/// How a terminated step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepInstanceTerminationState {
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for StepInstanceTerminationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for StepInstanceTerminationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid step instance termination state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(OrchestrationInstanceLifecycleState::Terminated.is_terminal());
        assert!(!OrchestrationInstanceLifecycleState::Running.is_terminal());
        assert!(StepInstanceLifecycleState::Terminated.is_terminal());
        assert!(!StepInstanceLifecycleState::Pending.is_terminal());
    }

    #[test]
    fn test_waiting_states() {
        assert!(OrchestrationInstanceLifecycleState::Pending.is_waiting());
        assert!(OrchestrationInstanceLifecycleState::Scheduled.is_waiting());
        assert!(!OrchestrationInstanceLifecycleState::Queued.is_waiting());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(
            OrchestrationInstanceLifecycleState::Scheduled.to_string(),
            "scheduled"
        );
        assert_eq!(
            "user_canceled"
                .parse::<OrchestrationInstanceTerminationState>()
                .unwrap(),
            OrchestrationInstanceTerminationState::UserCanceled
        );
        assert_eq!(
            "skipped".parse::<StepInstanceTerminationState>().unwrap(),
            StepInstanceTerminationState::Skipped
        );
        assert!("complete".parse::<StepInstanceLifecycleState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let state = OrchestrationInstanceTerminationState::UserCanceled;
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"user_canceled\"");

        let parsed: OrchestrationInstanceTerminationState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
