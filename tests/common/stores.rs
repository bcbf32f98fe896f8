//! Store wrappers that reproduce interleavings a single-threaded test cannot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use process_manager::database::{
    ActorActivitySearch, ChangeSet, InMemoryStore, OrchestrationInstanceSearch,
    ProcessManagerStore,
};
use process_manager::models::{
    IdempotencyKey, OrchestrationDescription, OrchestrationDescriptionId,
    OrchestrationDescriptionUniqueName, OrchestrationInstance, OrchestrationInstanceId,
};
use process_manager::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Misses the first `stale_lookups` idempotency-key lookups, as if the
/// competing writer committed right after each lookup ran.
#[derive(Debug)]
pub struct StaleIdempotencyLookupStore {
    inner: Arc<InMemoryStore>,
    stale_lookups: AtomicUsize,
}

impl StaleIdempotencyLookupStore {
    pub fn new(inner: Arc<InMemoryStore>, stale_lookups: usize) -> Self {
        Self {
            inner,
            stale_lookups: AtomicUsize::new(stale_lookups),
        }
    }
}

#[async_trait]
impl ProcessManagerStore for StaleIdempotencyLookupStore {
    async fn get_description(
        &self,
        id: OrchestrationDescriptionId,
    ) -> Result<Option<OrchestrationDescription>> {
        self.inner.get_description(id).await
    }

    async fn get_description_by_unique_name(
        &self,
        unique_name: &OrchestrationDescriptionUniqueName,
        is_enabled: Option<bool>,
    ) -> Result<Option<OrchestrationDescription>> {
        self.inner
            .get_description_by_unique_name(unique_name, is_enabled)
            .await
    }

    async fn get_descriptions_by_host_name(
        &self,
        host_name: &str,
    ) -> Result<Vec<OrchestrationDescription>> {
        self.inner.get_descriptions_by_host_name(host_name).await
    }

    async fn get_recurring_descriptions(&self) -> Result<Vec<OrchestrationDescription>> {
        self.inner.get_recurring_descriptions().await
    }

    async fn get_instance(
        &self,
        id: OrchestrationInstanceId,
    ) -> Result<Option<OrchestrationInstance>> {
        self.inner.get_instance(id).await
    }

    async fn get_instance_by_idempotency_key(
        &self,
        idempotency_key: &IdempotencyKey,
    ) -> Result<Option<OrchestrationInstance>> {
        let stale = self
            .stale_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(None);
        }
        self.inner.get_instance_by_idempotency_key(idempotency_key).await
    }

    async fn find_scheduled(
        &self,
        scheduled_to_run_before: DateTime<Utc>,
    ) -> Result<Vec<OrchestrationInstance>> {
        self.inner.find_scheduled(scheduled_to_run_before).await
    }

    async fn search_instances(
        &self,
        criteria: &OrchestrationInstanceSearch,
    ) -> Result<Vec<OrchestrationInstance>> {
        self.inner.search_instances(criteria).await
    }

    async fn search_actor_activity(
        &self,
        criteria: &ActorActivitySearch,
    ) -> Result<Vec<OrchestrationInstance>> {
        self.inner.search_actor_activity(criteria).await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        self.inner.commit(changes).await
    }
}
