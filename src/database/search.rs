//! Search criteria for orchestration instances.
//!
//! Both stores evaluate the same criteria: [`InMemoryStore`](super::InMemoryStore)
//! through the `matches` predicates below, [`PgStore`](super::PgStore) by
//! translating them into SQL with identical semantics. Every filter left as
//! `None` is unconstrained and all supplied filters must hold.

use crate::models::{
    ActorNumber, ActorRole, OrchestrationDescription, OrchestrationInstance,
};
use crate::state_machine::{
    OrchestrationInstanceLifecycleState, OrchestrationInstanceTerminationState,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Instances of one orchestration, filtered by their own lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationInstanceSearch {
    pub name: String,
    pub version: Option<i32>,
    pub lifecycle_states: Option<Vec<OrchestrationInstanceLifecycleState>>,
    pub termination_state: Option<OrchestrationInstanceTerminationState>,
    pub started_at_or_later: Option<DateTime<Utc>>,
    pub terminated_at_or_earlier: Option<DateTime<Utc>>,
    pub scheduled_at_or_later: Option<DateTime<Utc>>,
}

impl OrchestrationInstanceSearch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            lifecycle_states: None,
            termination_state: None,
            started_at_or_later: None,
            terminated_at_or_earlier: None,
            scheduled_at_or_later: None,
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_lifecycle_states(
        mut self,
        states: impl IntoIterator<Item = OrchestrationInstanceLifecycleState>,
    ) -> Self {
        self.lifecycle_states = Some(states.into_iter().collect());
        self
    }

    pub fn with_termination_state(mut self, state: OrchestrationInstanceTerminationState) -> Self {
        self.termination_state = Some(state);
        self
    }

    pub fn with_started_at_or_later(mut self, at: DateTime<Utc>) -> Self {
        self.started_at_or_later = Some(at);
        self
    }

    pub fn with_terminated_at_or_earlier(mut self, at: DateTime<Utc>) -> Self {
        self.terminated_at_or_earlier = Some(at);
        self
    }

    pub fn with_scheduled_at_or_later(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at_or_later = Some(at);
        self
    }

    /// A timestamp filter never matches an instance that lacks the timestamp.
    pub fn matches(
        &self,
        description: &OrchestrationDescription,
        instance: &OrchestrationInstance,
    ) -> bool {
        let unique_name = description.unique_name();
        if unique_name.name() != self.name {
            return false;
        }
        if self.version.is_some_and(|version| unique_name.version() != version) {
            return false;
        }

        let lifecycle = instance.lifecycle();
        if let Some(states) = &self.lifecycle_states {
            if !states.contains(&lifecycle.state()) {
                return false;
            }
        }
        if let Some(termination_state) = self.termination_state {
            if lifecycle.termination_state() != Some(termination_state) {
                return false;
            }
        }

        at_or_after(lifecycle.started_at(), self.started_at_or_later)
            && at_or_before(lifecycle.terminated_at(), self.terminated_at_or_earlier)
            && at_or_after(lifecycle.scheduled_to_run_at(), self.scheduled_at_or_later)
    }
}

/// Instances across a set of orchestrations that were activated inside a
/// time window, optionally narrowed to the actor that created them.
///
/// An instance is activated in the window when either its queued time or
/// its scheduled run time falls inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorActivitySearch {
    pub description_names: BTreeSet<String>,
    pub activated_at_or_later: DateTime<Utc>,
    pub activated_at_or_earlier: DateTime<Utc>,
    pub created_by_actor_number: Option<ActorNumber>,
    pub created_by_actor_role: Option<ActorRole>,
}

impl ActorActivitySearch {
    pub fn new<I, S>(
        description_names: I,
        activated_at_or_later: DateTime<Utc>,
        activated_at_or_earlier: DateTime<Utc>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            description_names: description_names.into_iter().map(Into::into).collect(),
            activated_at_or_later,
            activated_at_or_earlier,
            created_by_actor_number: None,
            created_by_actor_role: None,
        }
    }

    pub fn with_created_by_actor_number(mut self, number: ActorNumber) -> Self {
        self.created_by_actor_number = Some(number);
        self
    }

    pub fn with_created_by_actor_role(mut self, role: ActorRole) -> Self {
        self.created_by_actor_role = Some(role);
        self
    }

    pub fn matches(
        &self,
        description: &OrchestrationDescription,
        instance: &OrchestrationInstance,
    ) -> bool {
        if !self
            .description_names
            .contains(description.unique_name().name())
        {
            return false;
        }

        let lifecycle = instance.lifecycle();
        let in_window = |at: Option<DateTime<Utc>>| {
            at.is_some_and(|at| {
                at >= self.activated_at_or_later && at <= self.activated_at_or_earlier
            })
        };
        if !(in_window(lifecycle.queued_at()) || in_window(lifecycle.scheduled_to_run_at())) {
            return false;
        }

        let actor = lifecycle.created_by().acting_actor();
        if let Some(number) = &self.created_by_actor_number {
            if &actor.number != number {
                return false;
            }
        }
        if let Some(role) = self.created_by_actor_role {
            if actor.role != role {
                return false;
            }
        }
        true
    }
}

fn at_or_after(value: Option<DateTime<Utc>>, bound: Option<DateTime<Utc>>) -> bool {
    match bound {
        Some(bound) => value.is_some_and(|value| value >= bound),
        None => true,
    }
}

fn at_or_before(value: Option<DateTime<Utc>>, bound: Option<DateTime<Utc>>) -> bool {
    match bound {
        Some(bound) => value.is_some_and(|value| value <= bound),
        None => true,
    }
}
