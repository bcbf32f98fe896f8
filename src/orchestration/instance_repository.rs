//! Persistence gateway for orchestration instances.
//!
//! Reads go straight to the store. Writes are staged on a [`UnitOfWork`]
//! obtained from [`OrchestrationInstanceRepository::unit_of_work`] and only
//! reach the store when that unit of work is committed.

use crate::constants::entities;
use crate::database::{
    ActorActivitySearch, OrchestrationInstanceSearch, ProcessManagerStore, UnitOfWork,
};
use crate::error::{ProcessManagerError, Result};
use crate::models::{
    IdempotencyKey, OrchestrationDescription, OrchestrationDescriptionId, OrchestrationInstance,
    OrchestrationInstanceId,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct OrchestrationInstanceRepository {
    store: Arc<dyn ProcessManagerStore>,
}

impl OrchestrationInstanceRepository {
    pub fn new(store: Arc<dyn ProcessManagerStore>) -> Self {
        Self { store }
    }

    pub fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(self.store.clone())
    }

    /// The instance with `id`; fails with `NotFound` when it does not exist.
    pub async fn get(&self, id: OrchestrationInstanceId) -> Result<OrchestrationInstance> {
        self.store
            .get_instance(id)
            .await?
            .ok_or_else(|| ProcessManagerError::not_found(entities::ORCHESTRATION_INSTANCE, id))
    }

    pub async fn get_or_default(
        &self,
        id: OrchestrationInstanceId,
    ) -> Result<Option<OrchestrationInstance>> {
        self.store.get_instance(id).await
    }

    pub async fn get_or_default_by_idempotency_key(
        &self,
        idempotency_key: &IdempotencyKey,
    ) -> Result<Option<OrchestrationInstance>> {
        self.store.get_instance_by_idempotency_key(idempotency_key).await
    }

    /// Stage `instance` for insertion on `unit_of_work`.
    pub fn add(&self, unit_of_work: &mut UnitOfWork, instance: &OrchestrationInstance) {
        unit_of_work.add_instance(instance);
    }

    /// Scheduled instances due at or before `scheduled_to_run_before`.
    pub async fn find_scheduled(
        &self,
        scheduled_to_run_before: DateTime<Utc>,
    ) -> Result<Vec<OrchestrationInstance>> {
        self.store.find_scheduled(scheduled_to_run_before).await
    }

    pub async fn search(
        &self,
        criteria: &OrchestrationInstanceSearch,
    ) -> Result<Vec<OrchestrationInstance>> {
        self.store.search_instances(criteria).await
    }

    /// Instances of any of the named orchestrations activated within a time window.
    pub async fn search_actor_activity(
        &self,
        criteria: &ActorActivitySearch,
    ) -> Result<Vec<OrchestrationInstance>> {
        self.store.search_actor_activity(criteria).await
    }

    /// The description an instance was created from.
    pub async fn get_description(
        &self,
        id: OrchestrationDescriptionId,
    ) -> Result<OrchestrationDescription> {
        self.store
            .get_description(id)
            .await?
            .ok_or_else(|| ProcessManagerError::not_found(entities::ORCHESTRATION_DESCRIPTION, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryStore;

    #[tokio::test]
    async fn test_get_fails_for_missing_instance() {
        let repository = OrchestrationInstanceRepository::new(Arc::new(InMemoryStore::new()));
        let id = OrchestrationInstanceId::new();

        assert!(repository.get(id).await.unwrap_err().is_not_found());
        assert!(repository.get_or_default(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_description_fails_for_missing_description() {
        let repository = OrchestrationInstanceRepository::new(Arc::new(InMemoryStore::new()));

        let err = repository
            .get_description(OrchestrationDescriptionId::new())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }
}
