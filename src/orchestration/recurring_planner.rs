//! # Recurring Instance Planner
//!
//! Turns the cron expressions of enabled, recurring descriptions into scheduled
//! instances for the upcoming planning window.
//!
//! Every occurrence gets the idempotency key `recurring:{description_id}:{occurrence}`,
//! so planning the same window twice, or from two replicas at once, schedules
//! each occurrence only once. Planned instances are created by the DataHub
//! administrator actor with an empty parameter value.

use super::instance_repository::OrchestrationInstanceRepository;
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::constants::DATAHUB_ADMINISTRATOR_ACTOR_NUMBER;
use crate::database::ProcessManagerStore;
use crate::error::Result;
use crate::logging::log_instance_operation;
use crate::models::orchestration_description::cron_expression::occurrences_between;
use crate::models::{
    Actor, ActorNumber, ActorRole, IdempotencyKey, OperatingIdentity, OrchestrationDescription,
    OrchestrationDescriptionUniqueName, OrchestrationInstance, OrchestrationInstanceId,
    ParameterValue,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanningSummary {
    pub scheduled: Vec<OrchestrationInstanceId>,
    pub already_planned: usize,
    /// Descriptions whose occurrences could not be planned; the error is logged.
    pub failed: Vec<OrchestrationDescriptionUniqueName>,
}

#[derive(Debug, Clone)]
pub struct RecurringInstancePlanner {
    store: Arc<dyn ProcessManagerStore>,
    repository: OrchestrationInstanceRepository,
    clock: Arc<dyn Clock>,
    planning_window: Duration,
}

impl RecurringInstancePlanner {
    pub fn new(
        store: Arc<dyn ProcessManagerStore>,
        clock: Arc<dyn Clock>,
        planning_window: Duration,
    ) -> Self {
        Self {
            repository: OrchestrationInstanceRepository::new(store.clone()),
            store,
            clock,
            planning_window,
        }
    }

    pub fn from_config(
        store: Arc<dyn ProcessManagerStore>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self::new(store, clock, config.planning_window())
    }

    /// Schedule an instance for each occurrence in `(now, now + window]`.
    #[instrument(skip(self))]
    pub async fn plan_recurring_instances(&self) -> Result<PlanningSummary> {
        let now = self.clock.now();
        let until = now + self.planning_window;
        let mut summary = PlanningSummary::default();

        for description in self.store.get_recurring_descriptions().await? {
            if let Err(err) = self
                .plan_description(&description, now, until, &mut summary)
                .await
            {
                error!(
                    unique_name = %description.unique_name(),
                    error = %err,
                    "Failed to plan recurring orchestration instances"
                );
                summary.failed.push(description.unique_name().clone());
            }
        }

        info!(
            scheduled = summary.scheduled.len(),
            already_planned = summary.already_planned,
            failed = summary.failed.len(),
            "Planned recurring orchestration instances"
        );
        Ok(summary)
    }

    async fn plan_description(
        &self,
        description: &OrchestrationDescription,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
        summary: &mut PlanningSummary,
    ) -> Result<()> {
        let occurrences =
            occurrences_between(description.recurring_cron_expression(), now, until)?;

        for run_at in occurrences {
            let key = Self::idempotency_key(description, run_at)?;
            if self
                .repository
                .get_or_default_by_idempotency_key(&key)
                .await?
                .is_some()
            {
                summary.already_planned += 1;
                continue;
            }

            let instance = OrchestrationInstance::create_from_description(
                description,
                Self::planner_identity()?,
                ParameterValue::empty(),
                &BTreeSet::new(),
                now,
                Some(run_at),
            )?
            .with_idempotency_key(Some(key));

            let mut unit_of_work = self.repository.unit_of_work();
            self.repository.add(&mut unit_of_work, &instance);
            match unit_of_work.commit().await {
                Ok(()) => {
                    log_instance_operation(
                        "plan_recurring",
                        &instance.id().to_string(),
                        Some(&description.unique_name().to_string()),
                        "scheduled",
                        Some(&run_at.to_rfc3339()),
                    );
                    summary.scheduled.push(instance.id());
                }
                Err(err) if err.is_duplicate_key() => {
                    debug!(run_at = %run_at, "Occurrence planned concurrently");
                    summary.already_planned += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn idempotency_key(
        description: &OrchestrationDescription,
        run_at: DateTime<Utc>,
    ) -> Result<IdempotencyKey> {
        IdempotencyKey::new(format!(
            "recurring:{}:{}",
            description.id(),
            run_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ))
    }

    fn planner_identity() -> Result<OperatingIdentity> {
        Ok(OperatingIdentity::actor(Actor::new(
            ActorNumber::new(DATAHUB_ADMINISTRATOR_ACTOR_NUMBER)?,
            ActorRole::DataHubAdministrator,
        )))
    }
}
