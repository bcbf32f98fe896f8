//! # Orchestration Instance Manager
//!
//! Entry point for creating, scheduling and canceling orchestration instances.
//!
//! ## Idempotency
//!
//! Requests may carry an [`IdempotencyKey`]. An instance that already exists
//! for the key is returned instead of creating another one. The lookup before
//! insertion is an early exit; the store's unique constraint on the key is what
//! guarantees at most one instance, and a request that loses that race reads
//! back and returns the winner's id.
//!
//! ## Dispatch
//!
//! Started instances are queued and committed before the execution engine is
//! asked to run them. If the engine call fails the instance stays Queued, and a
//! retry with the same idempotency key asks the engine again.

use super::execution::{dispatch_if_durable, ExecutionEngineClient};
use super::instance_repository::OrchestrationInstanceRepository;
use crate::clock::Clock;
use crate::constants::entities;
use crate::database::ProcessManagerStore;
use crate::error::{ProcessManagerError, Result};
use crate::logging::log_instance_operation;
use crate::models::{
    ActorMessageId, IdempotencyKey, MeteringPointId, OperatingIdentity, OrchestrationDescription,
    OrchestrationDescriptionUniqueName, OrchestrationInstance, OrchestrationInstanceId,
    ParameterValue, TransactionId,
};
use crate::state_machine::OrchestrationInstanceLifecycleState;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Everything needed to create an orchestration instance.
#[derive(Debug, Clone, PartialEq)]
pub struct StartOrchestrationInstanceRequest {
    pub unique_name: OrchestrationDescriptionUniqueName,
    pub created_by: OperatingIdentity,
    pub parameter_value: ParameterValue,
    /// Sequences of skippable steps to terminate as Skipped at creation.
    pub skip_step_sequences: BTreeSet<i32>,
    pub idempotency_key: Option<IdempotencyKey>,
    pub actor_message_id: Option<ActorMessageId>,
    pub transaction_id: Option<TransactionId>,
    pub metering_point_id: Option<MeteringPointId>,
}

impl StartOrchestrationInstanceRequest {
    pub fn new(
        unique_name: OrchestrationDescriptionUniqueName,
        created_by: OperatingIdentity,
        parameter_value: ParameterValue,
    ) -> Self {
        Self {
            unique_name,
            created_by,
            parameter_value,
            skip_step_sequences: BTreeSet::new(),
            idempotency_key: None,
            actor_message_id: None,
            transaction_id: None,
            metering_point_id: None,
        }
    }

    pub fn with_skip_step_sequences(mut self, sequences: impl IntoIterator<Item = i32>) -> Self {
        self.skip_step_sequences = sequences.into_iter().collect();
        self
    }

    pub fn with_idempotency_key(mut self, idempotency_key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(idempotency_key);
        self
    }

    pub fn with_actor_message_id(mut self, actor_message_id: ActorMessageId) -> Self {
        self.actor_message_id = Some(actor_message_id);
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    pub fn with_metering_point_id(mut self, metering_point_id: MeteringPointId) -> Self {
        self.metering_point_id = Some(metering_point_id);
        self
    }
}

#[derive(Debug, Clone)]
pub struct OrchestrationInstanceManager {
    store: Arc<dyn ProcessManagerStore>,
    repository: OrchestrationInstanceRepository,
    execution_engine: Arc<dyn ExecutionEngineClient>,
    clock: Arc<dyn Clock>,
}

impl OrchestrationInstanceManager {
    pub fn new(
        store: Arc<dyn ProcessManagerStore>,
        execution_engine: Arc<dyn ExecutionEngineClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository: OrchestrationInstanceRepository::new(store.clone()),
            store,
            execution_engine,
            clock,
        }
    }

    pub fn repository(&self) -> &OrchestrationInstanceRepository {
        &self.repository
    }

    /// Create an instance, queue it and ask the execution engine to run it.
    #[instrument(skip(self, request), fields(unique_name = %request.unique_name))]
    pub async fn start_new_orchestration_instance(
        &self,
        request: StartOrchestrationInstanceRequest,
    ) -> Result<OrchestrationInstanceId> {
        if let Some(existing) = self.find_by_idempotency_key(&request).await? {
            if existing.lifecycle().state() == OrchestrationInstanceLifecycleState::Queued {
                let description = self
                    .repository
                    .get_description(existing.orchestration_description_id())
                    .await?;
                dispatch_if_durable(self.execution_engine.as_ref(), &description, &existing)
                    .await?;
            }
            return Ok(existing.id());
        }

        let description = self.get_enabled_description(&request.unique_name).await?;
        let now = self.clock.now();
        let mut instance = Self::build_instance(&description, &request, now, None)?;
        instance.lifecycle_mut().transition_to_queued(now)?;

        let Some(instance_id) = self.insert_instance(&instance, &request).await? else {
            return self.existing_instance_id(&request).await;
        };

        dispatch_if_durable(self.execution_engine.as_ref(), &description, &instance).await?;
        log_instance_operation(
            "start",
            &instance_id.to_string(),
            Some(&request.unique_name.to_string()),
            "queued",
            None,
        );
        Ok(instance_id)
    }

    /// Create an instance that the scheduler dispatches once `run_at` has passed.
    #[instrument(skip(self, request), fields(unique_name = %request.unique_name, run_at = %run_at))]
    pub async fn schedule_new_orchestration_instance(
        &self,
        request: StartOrchestrationInstanceRequest,
        run_at: DateTime<Utc>,
    ) -> Result<OrchestrationInstanceId> {
        if let Some(existing) = self.find_by_idempotency_key(&request).await? {
            return Ok(existing.id());
        }

        let description = self.get_enabled_description(&request.unique_name).await?;
        let instance = Self::build_instance(&description, &request, self.clock.now(), Some(run_at))?;

        let Some(instance_id) = self.insert_instance(&instance, &request).await? else {
            return self.existing_instance_id(&request).await;
        };

        log_instance_operation(
            "schedule",
            &instance_id.to_string(),
            Some(&request.unique_name.to_string()),
            "scheduled",
            Some(&run_at.to_rfc3339()),
        );
        Ok(instance_id)
    }

    /// Cancel an instance that is still waiting for its scheduled run time.
    #[instrument(skip(self, canceled_by))]
    pub async fn cancel_scheduled_orchestration_instance(
        &self,
        id: OrchestrationInstanceId,
        canceled_by: OperatingIdentity,
    ) -> Result<()> {
        let mut instance = self.repository.get(id).await?;
        if !instance.lifecycle().is_scheduled() {
            return Err(ProcessManagerError::InvalidOperation(format!(
                "Orchestration instance {id} cannot be canceled in state {}",
                instance.lifecycle().state()
            )));
        }

        instance
            .lifecycle_mut()
            .transition_to_user_canceled(self.clock.now(), canceled_by)?;

        let mut unit_of_work = self.repository.unit_of_work();
        unit_of_work.update_instance(&mut instance);
        unit_of_work.commit().await?;

        log_instance_operation("cancel", &id.to_string(), None, "user_canceled", None);
        Ok(())
    }

    async fn get_enabled_description(
        &self,
        unique_name: &OrchestrationDescriptionUniqueName,
    ) -> Result<OrchestrationDescription> {
        let description = self
            .store
            .get_description_by_unique_name(unique_name, None)
            .await?
            .ok_or_else(|| {
                ProcessManagerError::not_found(entities::ORCHESTRATION_DESCRIPTION, unique_name)
            })?;

        if !description.is_enabled() {
            return Err(ProcessManagerError::InvalidOperation(format!(
                "Orchestration description {unique_name} is disabled"
            )));
        }
        Ok(description)
    }

    fn build_instance(
        description: &OrchestrationDescription,
        request: &StartOrchestrationInstanceRequest,
        now: DateTime<Utc>,
        run_at: Option<DateTime<Utc>>,
    ) -> Result<OrchestrationInstance> {
        Ok(OrchestrationInstance::create_from_description(
            description,
            request.created_by.clone(),
            request.parameter_value.clone(),
            &request.skip_step_sequences,
            now,
            run_at,
        )?
        .with_idempotency_key(request.idempotency_key.clone())
        .with_actor_message_id(request.actor_message_id.clone())
        .with_transaction_id(request.transaction_id.clone())
        .with_metering_point_id(request.metering_point_id.clone()))
    }

    async fn find_by_idempotency_key(
        &self,
        request: &StartOrchestrationInstanceRequest,
    ) -> Result<Option<OrchestrationInstance>> {
        let Some(key) = &request.idempotency_key else {
            return Ok(None);
        };

        let existing = self.repository.get_or_default_by_idempotency_key(key).await?;
        if let Some(instance) = &existing {
            debug!(
                idempotency_key = %key,
                instance_id = %instance.id(),
                "Returning existing orchestration instance for idempotency key"
            );
        }
        Ok(existing)
    }

    /// Commit the new instance. `None` means another request with the same
    /// idempotency key committed first.
    async fn insert_instance(
        &self,
        instance: &OrchestrationInstance,
        request: &StartOrchestrationInstanceRequest,
    ) -> Result<Option<OrchestrationInstanceId>> {
        let mut unit_of_work = self.repository.unit_of_work();
        self.repository.add(&mut unit_of_work, instance);

        match unit_of_work.commit().await {
            Ok(()) => Ok(Some(instance.id())),
            Err(err) if err.is_duplicate_key() && request.idempotency_key.is_some() => {
                info!(
                    instance_id = %instance.id(),
                    "Lost idempotency race, returning the committed orchestration instance"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn existing_instance_id(
        &self,
        request: &StartOrchestrationInstanceRequest,
    ) -> Result<OrchestrationInstanceId> {
        self.find_by_idempotency_key(request)
            .await?
            .map(|instance| instance.id())
            .ok_or_else(|| {
                ProcessManagerError::not_found(
                    entities::ORCHESTRATION_INSTANCE,
                    request
                        .idempotency_key
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                )
            })
    }
}
