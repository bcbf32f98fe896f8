//! # Scheduled Instance Dispatcher
//!
//! Polls for scheduled instances whose run time has passed, queues them and
//! hands them to the execution engine.
//!
//! Several replicas may poll the same store. Each due instance is queued in its
//! own unit of work, so when two replicas race for one instance the loser gets a
//! concurrency conflict, logs it and moves on to the next instance.

use super::execution::{dispatch_if_durable, ExecutionEngineClient};
use super::instance_repository::OrchestrationInstanceRepository;
use crate::clock::Clock;
use crate::error::Result;
use crate::logging::log_instance_operation;
use crate::models::{OrchestrationInstance, OrchestrationInstanceId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Instances queued by this pass.
    pub queued: Vec<OrchestrationInstanceId>,
    /// Instances another dispatcher updated first.
    pub skipped_conflicts: usize,
}

#[derive(Debug, Clone)]
pub struct ScheduledInstanceDispatcher {
    repository: OrchestrationInstanceRepository,
    execution_engine: Arc<dyn ExecutionEngineClient>,
    clock: Arc<dyn Clock>,
}

impl ScheduledInstanceDispatcher {
    pub fn new(
        repository: OrchestrationInstanceRepository,
        execution_engine: Arc<dyn ExecutionEngineClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            execution_engine,
            clock,
        }
    }

    /// Queue and dispatch every scheduled instance that is due now.
    #[instrument(skip(self))]
    pub async fn dispatch_due_instances(&self) -> Result<DispatchSummary> {
        let now = self.clock.now();
        let due = self.repository.find_scheduled(now).await?;
        let mut summary = DispatchSummary::default();

        if due.is_empty() {
            debug!("No scheduled orchestration instances are due");
            return Ok(summary);
        }

        for instance in due {
            let id = instance.id();
            match self.dispatch(instance).await {
                Ok(()) => summary.queued.push(id),
                Err(err) if err.is_concurrency_conflict() => {
                    warn!(instance_id = %id, "Scheduled instance was updated concurrently, skipping");
                    summary.skipped_conflicts += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            queued = summary.queued.len(),
            skipped_conflicts = summary.skipped_conflicts,
            "Dispatched scheduled orchestration instances"
        );
        Ok(summary)
    }

    async fn dispatch(&self, mut instance: OrchestrationInstance) -> Result<()> {
        let description = self
            .repository
            .get_description(instance.orchestration_description_id())
            .await?;

        instance.lifecycle_mut().transition_to_queued(self.clock.now())?;
        let mut unit_of_work = self.repository.unit_of_work();
        unit_of_work.update_instance(&mut instance);
        unit_of_work.commit().await?;

        dispatch_if_durable(self.execution_engine.as_ref(), &description, &instance).await?;
        log_instance_operation(
            "dispatch_scheduled",
            &instance.id().to_string(),
            Some(&description.unique_name().to_string()),
            "queued",
            None,
        );
        Ok(())
    }

    /// Poll every `interval` until `shutdown` flips to `true`.
    ///
    /// A failed pass is logged and the loop keeps polling.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_seconds = interval.as_secs(), "Scheduled instance dispatcher started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.dispatch_due_instances().await {
                        error!("Scheduled instance dispatch failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scheduled instance dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }
}
