//! In-memory store for tests and embedded use.
//!
//! Holds both aggregate maps behind one `parking_lot::RwLock`. A commit applies
//! the change set to a copy of the state and swaps it in only when every change
//! succeeded, which gives the same all-or-nothing behaviour as a database
//! transaction.
//!
//! ## Limitations
//!
//! - **No durability**: all state is lost when the process exits
//! - **Single process**: state is not shared across process boundaries

use super::search::{ActorActivitySearch, OrchestrationInstanceSearch};
use super::store::ProcessManagerStore;
use super::unit_of_work::{ChangeSet, StagedChange};
use crate::constants::entities;
use crate::error::{ProcessManagerError, Result};
use crate::models::{
    IdempotencyKey, OrchestrationDescription, OrchestrationDescriptionId,
    OrchestrationDescriptionUniqueName, OrchestrationInstance, OrchestrationInstanceId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct StoreState {
    descriptions: HashMap<OrchestrationDescriptionId, OrchestrationDescription>,
    instances: HashMap<OrchestrationInstanceId, OrchestrationInstance>,
}

impl StoreState {
    fn apply(&mut self, change: StagedChange) -> Result<()> {
        match change {
            StagedChange::InsertDescription(description) => {
                let taken = self.descriptions.contains_key(&description.id())
                    || self
                        .descriptions
                        .values()
                        .any(|existing| existing.unique_name() == description.unique_name());
                if taken {
                    return Err(ProcessManagerError::DuplicateKey {
                        entity: entities::ORCHESTRATION_DESCRIPTION,
                        key: description.unique_name().to_string(),
                    });
                }
                self.descriptions.insert(description.id(), description);
            }
            StagedChange::UpdateDescription {
                description,
                expected_version,
            } => {
                let current = self
                    .descriptions
                    .get(&description.id())
                    .map(OrchestrationDescription::row_version);
                if current != Some(expected_version) {
                    return Err(ProcessManagerError::concurrency_conflict(
                        entities::ORCHESTRATION_DESCRIPTION,
                        description.id(),
                    ));
                }
                self.descriptions.insert(description.id(), description);
            }
            StagedChange::InsertInstance(instance) => {
                if !self
                    .descriptions
                    .contains_key(&instance.orchestration_description_id())
                {
                    return Err(ProcessManagerError::not_found(
                        entities::ORCHESTRATION_DESCRIPTION,
                        instance.orchestration_description_id(),
                    ));
                }
                if self.instances.contains_key(&instance.id()) {
                    return Err(ProcessManagerError::DuplicateKey {
                        entity: entities::ORCHESTRATION_INSTANCE,
                        key: instance.id().to_string(),
                    });
                }
                if let Some(key) = instance.idempotency_key() {
                    if self.find_by_idempotency_key(key).is_some() {
                        return Err(ProcessManagerError::DuplicateKey {
                            entity: entities::ORCHESTRATION_INSTANCE,
                            key: key.to_string(),
                        });
                    }
                }
                self.instances.insert(instance.id(), instance);
            }
            StagedChange::UpdateInstance {
                instance,
                expected_version,
            } => {
                let current = self
                    .instances
                    .get(&instance.id())
                    .map(OrchestrationInstance::row_version);
                if current != Some(expected_version) {
                    return Err(ProcessManagerError::concurrency_conflict(
                        entities::ORCHESTRATION_INSTANCE,
                        instance.id(),
                    ));
                }
                self.instances.insert(instance.id(), instance);
            }
        }
        Ok(())
    }

    fn find_by_idempotency_key(&self, key: &IdempotencyKey) -> Option<&OrchestrationInstance> {
        self.instances
            .values()
            .find(|instance| instance.idempotency_key() == Some(key))
    }

    /// Instances joined to their description, ordered by creation time.
    fn joined_instances<F>(&self, predicate: F) -> Vec<OrchestrationInstance>
    where
        F: Fn(&OrchestrationDescription, &OrchestrationInstance) -> bool,
    {
        let mut matching: Vec<OrchestrationInstance> = self
            .instances
            .values()
            .filter(|instance| {
                self.descriptions
                    .get(&instance.orchestration_description_id())
                    .is_some_and(|description| predicate(description, instance))
            })
            .cloned()
            .collect();
        sort_by_creation(&mut matching);
        matching
    }
}

fn sort_by_creation(instances: &mut [OrchestrationInstance]) {
    instances.sort_by_key(|instance| (instance.lifecycle().created_at(), instance.id()));
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description_count(&self) -> usize {
        self.state.read().descriptions.len()
    }

    pub fn instance_count(&self) -> usize {
        self.state.read().instances.len()
    }
}

#[async_trait]
impl ProcessManagerStore for InMemoryStore {
    async fn get_description(
        &self,
        id: OrchestrationDescriptionId,
    ) -> Result<Option<OrchestrationDescription>> {
        Ok(self.state.read().descriptions.get(&id).cloned())
    }

    async fn get_description_by_unique_name(
        &self,
        unique_name: &OrchestrationDescriptionUniqueName,
        is_enabled: Option<bool>,
    ) -> Result<Option<OrchestrationDescription>> {
        let state = self.state.read();
        Ok(state
            .descriptions
            .values()
            .find(|description| {
                description.unique_name() == unique_name
                    && is_enabled.map_or(true, |enabled| description.is_enabled() == enabled)
            })
            .cloned())
    }

    async fn get_descriptions_by_host_name(
        &self,
        host_name: &str,
    ) -> Result<Vec<OrchestrationDescription>> {
        let state = self.state.read();
        let mut descriptions: Vec<OrchestrationDescription> = state
            .descriptions
            .values()
            .filter(|description| description.host_name() == host_name)
            .cloned()
            .collect();
        descriptions.sort_by(|a, b| a.unique_name().cmp(b.unique_name()));
        Ok(descriptions)
    }

    async fn get_recurring_descriptions(&self) -> Result<Vec<OrchestrationDescription>> {
        let state = self.state.read();
        let mut descriptions: Vec<OrchestrationDescription> = state
            .descriptions
            .values()
            .filter(|description| description.is_enabled() && description.is_recurring())
            .cloned()
            .collect();
        descriptions.sort_by(|a, b| a.unique_name().cmp(b.unique_name()));
        Ok(descriptions)
    }

    async fn get_instance(
        &self,
        id: OrchestrationInstanceId,
    ) -> Result<Option<OrchestrationInstance>> {
        Ok(self.state.read().instances.get(&id).cloned())
    }

    async fn get_instance_by_idempotency_key(
        &self,
        idempotency_key: &IdempotencyKey,
    ) -> Result<Option<OrchestrationInstance>> {
        Ok(self
            .state
            .read()
            .find_by_idempotency_key(idempotency_key)
            .cloned())
    }

    async fn find_scheduled(
        &self,
        scheduled_to_run_before: DateTime<Utc>,
    ) -> Result<Vec<OrchestrationInstance>> {
        let state = self.state.read();
        let mut due: Vec<OrchestrationInstance> = state
            .instances
            .values()
            .filter(|instance| {
                let lifecycle = instance.lifecycle();
                lifecycle.is_scheduled()
                    && lifecycle
                        .scheduled_to_run_at()
                        .is_some_and(|run_at| run_at <= scheduled_to_run_before)
            })
            .cloned()
            .collect();
        due.sort_by_key(|instance| (instance.lifecycle().scheduled_to_run_at(), instance.id()));
        Ok(due)
    }

    async fn search_instances(
        &self,
        criteria: &OrchestrationInstanceSearch,
    ) -> Result<Vec<OrchestrationInstance>> {
        Ok(self
            .state
            .read()
            .joined_instances(|description, instance| criteria.matches(description, instance)))
    }

    async fn search_actor_activity(
        &self,
        criteria: &ActorActivitySearch,
    ) -> Result<Vec<OrchestrationInstance>> {
        Ok(self
            .state
            .read()
            .joined_instances(|description, instance| criteria.matches(description, instance)))
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut state = self.state.write();
        let mut next = state.clone();
        for change in changes.into_changes() {
            next.apply(change)?;
        }
        *state = next;
        Ok(())
    }
}
