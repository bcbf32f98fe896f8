//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub mod builders;
pub mod stores;
pub mod strategies;

use chrono::{DateTime, TimeZone, Utc};
use process_manager::clock::{Clock, FixedClock};
use process_manager::config::RegisterConfig;
use process_manager::database::{InMemoryStore, ProcessManagerStore};
use process_manager::models::{Actor, ActorNumber, ActorRole, OperatingIdentity};
use process_manager::orchestration::{
    InMemoryExecutionEngine, OrchestrationInstanceManager, OrchestrationInstanceRepository,
    ProgressRepository, RecurringInstancePlanner, ScheduledInstanceDispatcher,
};
use process_manager::registry::OrchestrationRegister;
use std::sync::Arc;

pub const HOST_NAME: &str = "process-manager-orchestrations";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap()
}

pub fn actor_identity(number: &str, role: ActorRole) -> OperatingIdentity {
    OperatingIdentity::actor(Actor::new(ActorNumber::new(number).unwrap(), role))
}

pub fn grid_access_provider() -> OperatingIdentity {
    actor_identity("5790000000001", ActorRole::GridAccessProvider)
}

/// Everything wired against one in-memory store and one pinned clock.
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub engine: Arc<InMemoryExecutionEngine>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            clock: Arc::new(FixedClock::new(start_time())),
            engine: Arc::new(InMemoryExecutionEngine::new()),
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn store(&self) -> Arc<dyn ProcessManagerStore> {
        self.store.clone()
    }

    pub fn register(&self, allow_breaking_changes: bool) -> OrchestrationRegister {
        OrchestrationRegister::new(
            self.store(),
            RegisterConfig {
                allow_orchestration_description_breaking_changes: allow_breaking_changes,
            },
        )
    }

    pub fn repository(&self) -> OrchestrationInstanceRepository {
        OrchestrationInstanceRepository::new(self.store())
    }

    pub fn manager(&self) -> OrchestrationInstanceManager {
        OrchestrationInstanceManager::new(self.store(), self.engine.clone(), self.clock.clone())
    }

    pub fn progress(&self) -> ProgressRepository {
        ProgressRepository::new(self.repository(), self.clock.clone())
    }

    pub fn dispatcher(&self) -> ScheduledInstanceDispatcher {
        ScheduledInstanceDispatcher::new(self.repository(), self.engine.clone(), self.clock.clone())
    }

    pub fn planner(&self, window: chrono::Duration) -> RecurringInstancePlanner {
        RecurringInstancePlanner::new(self.store(), self.clock.clone(), window)
    }
}
