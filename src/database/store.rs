//! Store contract shared by the in-memory and PostgreSQL backends.
//!
//! Reads return fully hydrated aggregates (a description with its steps, an
//! instance with its steps). All writes go through [`ProcessManagerStore::commit`],
//! which applies a [`ChangeSet`] atomically: either every staged change is
//! persisted or none is.
//!
//! ## Commit guarantees
//!
//! - Inserting a description whose unique name exists fails with `DuplicateKey`
//! - Inserting an instance whose idempotency key exists fails with `DuplicateKey`
//! - Updating a row whose version differs from the staged expected version
//!   (or that no longer exists) fails with `ConcurrencyConflict`

use super::search::{ActorActivitySearch, OrchestrationInstanceSearch};
use super::unit_of_work::ChangeSet;
use crate::error::Result;
use crate::models::{
    IdempotencyKey, OrchestrationDescription, OrchestrationDescriptionId,
    OrchestrationDescriptionUniqueName, OrchestrationInstance, OrchestrationInstanceId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

#[async_trait]
pub trait ProcessManagerStore: Send + Sync + Debug {
    // --- Orchestration descriptions ---

    async fn get_description(
        &self,
        id: OrchestrationDescriptionId,
    ) -> Result<Option<OrchestrationDescription>>;

    /// `is_enabled = None` ignores the enabled flag.
    async fn get_description_by_unique_name(
        &self,
        unique_name: &OrchestrationDescriptionUniqueName,
        is_enabled: Option<bool>,
    ) -> Result<Option<OrchestrationDescription>>;

    async fn get_descriptions_by_host_name(
        &self,
        host_name: &str,
    ) -> Result<Vec<OrchestrationDescription>>;

    /// Enabled descriptions with a recurring cron expression.
    async fn get_recurring_descriptions(&self) -> Result<Vec<OrchestrationDescription>>;

    // --- Orchestration instances ---

    async fn get_instance(
        &self,
        id: OrchestrationInstanceId,
    ) -> Result<Option<OrchestrationInstance>>;

    async fn get_instance_by_idempotency_key(
        &self,
        idempotency_key: &IdempotencyKey,
    ) -> Result<Option<OrchestrationInstance>>;

    /// Scheduled instances whose run time is at or before `scheduled_to_run_before`.
    async fn find_scheduled(
        &self,
        scheduled_to_run_before: DateTime<Utc>,
    ) -> Result<Vec<OrchestrationInstance>>;

    async fn search_instances(
        &self,
        criteria: &OrchestrationInstanceSearch,
    ) -> Result<Vec<OrchestrationInstance>>;

    async fn search_actor_activity(
        &self,
        criteria: &ActorActivitySearch,
    ) -> Result<Vec<OrchestrationInstance>>;

    // --- Writes ---

    async fn commit(&self, changes: ChangeSet) -> Result<()>;
}
