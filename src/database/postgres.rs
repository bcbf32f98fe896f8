//! # PostgreSQL Store
//!
//! [`ProcessManagerStore`] backed by PostgreSQL through `sqlx`. Queries are
//! checked at runtime, so the crate builds without a live database.
//!
//! ## Layout
//!
//! - `orchestration_descriptions` + `step_descriptions` (keyed by description and sequence)
//! - `orchestration_instances` + `step_instances`
//!
//! Each aggregate root row carries a `row_version` column. Updates are guarded
//! with `WHERE id = $1 AND row_version = $2`; zero affected rows is reported as
//! a concurrency conflict. Unique violations (unique name, idempotency key)
//! are reported as duplicate keys. Each commit runs in one transaction.

use super::search::{ActorActivitySearch, OrchestrationInstanceSearch};
use super::store::ProcessManagerStore;
use super::unit_of_work::{ChangeSet, StagedChange};
use crate::constants::entities;
use crate::error::{ProcessManagerError, Result};
use crate::models::{
    CustomState, IdempotencyKey, OperatingIdentity, OrchestrationDescription,
    OrchestrationDescriptionId, OrchestrationDescriptionUniqueName, OrchestrationInstance,
    OrchestrationInstanceId, OrchestrationInstanceLifecycle, ParameterDefinition, ParameterValue,
    RowVersion, StepDescription, StepInstance, StepInstanceId, StepInstanceLifecycle,
};
use crate::models::{ActorMessageId, MeteringPointId, TransactionId};
use crate::state_machine::OrchestrationInstanceLifecycleState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const DESCRIPTION_COLUMNS: &str = "d.id, d.name, d.version, d.can_be_scheduled, \
     d.recurring_cron_expression, d.function_name, d.parameter_definition, d.host_name, \
     d.is_enabled, d.is_under_development, d.row_version";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_descriptions(
        &self,
        rows: Vec<DescriptionRow>,
    ) -> Result<Vec<OrchestrationDescription>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let step_rows: Vec<StepDescriptionRow> = sqlx::query_as(
            "SELECT orchestration_description_id, sequence, description, can_be_skipped, skip_reason \
             FROM step_descriptions WHERE orchestration_description_id = ANY($1) \
             ORDER BY orchestration_description_id, sequence",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut steps_by_description: HashMap<Uuid, Vec<StepDescriptionRow>> = HashMap::new();
        for step in step_rows {
            steps_by_description
                .entry(step.orchestration_description_id)
                .or_default()
                .push(step);
        }

        rows.into_iter()
            .map(|row| {
                let steps = steps_by_description.remove(&row.id).unwrap_or_default();
                row.into_description(steps)
            })
            .collect()
    }

    async fn fetch_descriptions(
        &self,
        mut builder: QueryBuilder<'static, Postgres>,
    ) -> Result<Vec<OrchestrationDescription>> {
        let rows: Vec<DescriptionRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        self.load_descriptions(rows).await
    }

    async fn load_instances(&self, rows: Vec<InstanceRow>) -> Result<Vec<OrchestrationInstance>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let step_rows: Vec<StepInstanceRow> = sqlx::query_as(
            "SELECT id, orchestration_instance_id, sequence, description, can_be_skipped, \
             lifecycle_state, lifecycle_termination_state, started_at, terminated_at, custom_state \
             FROM step_instances WHERE orchestration_instance_id = ANY($1) \
             ORDER BY orchestration_instance_id, sequence",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut steps_by_instance: HashMap<Uuid, Vec<StepInstanceRow>> = HashMap::new();
        for step in step_rows {
            steps_by_instance
                .entry(step.orchestration_instance_id)
                .or_default()
                .push(step);
        }

        rows.into_iter()
            .map(|row| {
                let steps = steps_by_instance.remove(&row.id).unwrap_or_default();
                row.into_instance(steps)
            })
            .collect()
    }

    async fn fetch_instances(
        &self,
        scope: InstanceScope,
    ) -> Result<Vec<OrchestrationInstance>> {
        let rows = scope.all(&self.pool).await?;
        self.load_instances(rows).await
    }
}

#[async_trait]
impl ProcessManagerStore for PgStore {
    async fn get_description(
        &self,
        id: OrchestrationDescriptionId,
    ) -> Result<Option<OrchestrationDescription>> {
        let mut builder = description_query();
        builder.push(" WHERE d.id = ").push_bind(id.as_uuid());
        Ok(self.fetch_descriptions(builder).await?.into_iter().next())
    }

    async fn get_description_by_unique_name(
        &self,
        unique_name: &OrchestrationDescriptionUniqueName,
        is_enabled: Option<bool>,
    ) -> Result<Option<OrchestrationDescription>> {
        let mut builder = description_query();
        builder
            .push(" WHERE d.name = ")
            .push_bind(unique_name.name().to_string())
            .push(" AND d.version = ")
            .push_bind(unique_name.version());
        if let Some(is_enabled) = is_enabled {
            builder.push(" AND d.is_enabled = ").push_bind(is_enabled);
        }
        Ok(self.fetch_descriptions(builder).await?.into_iter().next())
    }

    async fn get_descriptions_by_host_name(
        &self,
        host_name: &str,
    ) -> Result<Vec<OrchestrationDescription>> {
        let mut builder = description_query();
        builder
            .push(" WHERE d.host_name = ")
            .push_bind(host_name.to_string())
            .push(" ORDER BY d.name, d.version");
        self.fetch_descriptions(builder).await
    }

    async fn get_recurring_descriptions(&self) -> Result<Vec<OrchestrationDescription>> {
        let mut builder = description_query();
        builder.push(
            " WHERE d.is_enabled = TRUE AND d.recurring_cron_expression <> '' \
             ORDER BY d.name, d.version",
        );
        self.fetch_descriptions(builder).await
    }

    async fn get_instance(
        &self,
        id: OrchestrationInstanceId,
    ) -> Result<Option<OrchestrationInstance>> {
        let scope = InstanceScope::new().with_id(id);
        Ok(self.fetch_instances(scope).await?.into_iter().next())
    }

    async fn get_instance_by_idempotency_key(
        &self,
        idempotency_key: &IdempotencyKey,
    ) -> Result<Option<OrchestrationInstance>> {
        let scope = InstanceScope::new().with_idempotency_key(idempotency_key);
        Ok(self.fetch_instances(scope).await?.into_iter().next())
    }

    async fn find_scheduled(
        &self,
        scheduled_to_run_before: DateTime<Utc>,
    ) -> Result<Vec<OrchestrationInstance>> {
        let scope = InstanceScope::new()
            .in_states(&[OrchestrationInstanceLifecycleState::Scheduled])
            .scheduled_at_or_before(scheduled_to_run_before)
            .ordered_by_scheduled_time();
        self.fetch_instances(scope).await
    }

    async fn search_instances(
        &self,
        criteria: &OrchestrationInstanceSearch,
    ) -> Result<Vec<OrchestrationInstance>> {
        let mut scope = InstanceScope::new().with_description_name(&criteria.name);
        if let Some(version) = criteria.version {
            scope = scope.with_description_version(version);
        }
        if let Some(states) = &criteria.lifecycle_states {
            scope = scope.in_states(states);
        }
        if let Some(termination_state) = criteria.termination_state {
            scope = scope.with_termination_state(termination_state.to_string());
        }
        if let Some(at) = criteria.started_at_or_later {
            scope = scope.timestamp_at_or_later("started_at", at);
        }
        if let Some(at) = criteria.terminated_at_or_earlier {
            scope = scope.timestamp_at_or_earlier("terminated_at", at);
        }
        if let Some(at) = criteria.scheduled_at_or_later {
            scope = scope.timestamp_at_or_later("scheduled_to_run_at", at);
        }
        self.fetch_instances(scope.ordered_by_creation()).await
    }

    async fn search_actor_activity(
        &self,
        criteria: &ActorActivitySearch,
    ) -> Result<Vec<OrchestrationInstance>> {
        let names: Vec<String> = criteria.description_names.iter().cloned().collect();
        let mut scope = InstanceScope::new()
            .with_description_names(names)
            .activated_between(criteria.activated_at_or_later, criteria.activated_at_or_earlier);
        if let Some(number) = &criteria.created_by_actor_number {
            scope = scope.created_by_actor_number(number.as_str());
        }
        if let Some(role) = criteria.created_by_actor_role {
            scope = scope.created_by_actor_role(role.to_string());
        }
        self.fetch_instances(scope.ordered_by_creation()).await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        debug!(change_count = changes.len(), "Applying change set");

        for change in changes.into_changes() {
            match change {
                StagedChange::InsertDescription(description) => {
                    insert_description(&mut tx, &description).await?;
                }
                StagedChange::UpdateDescription {
                    description,
                    expected_version,
                } => {
                    update_description(&mut tx, &description, expected_version).await?;
                }
                StagedChange::InsertInstance(instance) => {
                    insert_instance(&mut tx, &instance).await?;
                }
                StagedChange::UpdateInstance {
                    instance,
                    expected_version,
                } => {
                    update_instance(&mut tx, &instance, expected_version).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

fn description_query() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!(
        "SELECT {DESCRIPTION_COLUMNS} FROM orchestration_descriptions d"
    ))
}

/// Maps a unique violation to `DuplicateKey`; any other error passes through.
fn map_unique_violation(error: sqlx::Error, entity: &'static str, key: String) -> ProcessManagerError {
    match &error {
        sqlx::Error::Database(database_error) if database_error.is_unique_violation() => {
            ProcessManagerError::DuplicateKey { entity, key }
        }
        _ => error.into(),
    }
}

async fn insert_description(
    tx: &mut Transaction<'_, Postgres>,
    description: &OrchestrationDescription,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO orchestration_descriptions \
         (id, name, version, can_be_scheduled, recurring_cron_expression, function_name, \
          parameter_definition, host_name, is_enabled, is_under_development, row_version) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(description.id().as_uuid())
    .bind(description.unique_name().name())
    .bind(description.unique_name().version())
    .bind(description.can_be_scheduled())
    .bind(description.recurring_cron_expression())
    .bind(description.function_name())
    .bind(description.parameter_definition().serialized())
    .bind(description.host_name())
    .bind(description.is_enabled())
    .bind(description.is_under_development())
    .bind(description.row_version().value())
    .execute(&mut **tx)
    .await
    .map_err(|error| {
        map_unique_violation(
            error,
            entities::ORCHESTRATION_DESCRIPTION,
            description.unique_name().to_string(),
        )
    })?;

    insert_step_descriptions(tx, description).await
}

async fn insert_step_descriptions(
    tx: &mut Transaction<'_, Postgres>,
    description: &OrchestrationDescription,
) -> Result<()> {
    for step in description.steps() {
        sqlx::query(
            "INSERT INTO step_descriptions \
             (orchestration_description_id, sequence, description, can_be_skipped, skip_reason) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(description.id().as_uuid())
        .bind(step.sequence())
        .bind(step.description())
        .bind(step.can_be_skipped())
        .bind(step.skip_reason())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn update_description(
    tx: &mut Transaction<'_, Postgres>,
    description: &OrchestrationDescription,
    expected_version: RowVersion,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE orchestration_descriptions SET \
         can_be_scheduled = $3, recurring_cron_expression = $4, function_name = $5, \
         parameter_definition = $6, host_name = $7, is_enabled = $8, \
         is_under_development = $9, row_version = $10 \
         WHERE id = $1 AND row_version = $2",
    )
    .bind(description.id().as_uuid())
    .bind(expected_version.value())
    .bind(description.can_be_scheduled())
    .bind(description.recurring_cron_expression())
    .bind(description.function_name())
    .bind(description.parameter_definition().serialized())
    .bind(description.host_name())
    .bind(description.is_enabled())
    .bind(description.is_under_development())
    .bind(description.row_version().value())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ProcessManagerError::concurrency_conflict(
            entities::ORCHESTRATION_DESCRIPTION,
            description.id(),
        ));
    }

    // Steps may have been replaced wholesale.
    sqlx::query("DELETE FROM step_descriptions WHERE orchestration_description_id = $1")
        .bind(description.id().as_uuid())
        .execute(&mut **tx)
        .await?;
    insert_step_descriptions(tx, description).await
}

async fn insert_instance(
    tx: &mut Transaction<'_, Postgres>,
    instance: &OrchestrationInstance,
) -> Result<()> {
    let lifecycle = instance.lifecycle();
    let created_by = lifecycle.created_by();

    sqlx::query(
        "INSERT INTO orchestration_instances \
         (id, orchestration_description_id, parameter_value, custom_state, lifecycle_state, \
          lifecycle_termination_state, created_by, created_by_actor_number, created_by_actor_role, \
          canceled_by, created_at, scheduled_to_run_at, queued_at, started_at, terminated_at, \
          idempotency_key, actor_message_id, transaction_id, metering_point_id, row_version) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
    )
    .bind(instance.id().as_uuid())
    .bind(instance.orchestration_description_id().as_uuid())
    .bind(instance.parameter_value().serialized_value())
    .bind(instance.custom_state().serialized_value())
    .bind(lifecycle.state().to_string())
    .bind(lifecycle.termination_state().map(|state| state.to_string()))
    .bind(Json(created_by))
    .bind(created_by.acting_actor().number.as_str())
    .bind(created_by.acting_actor().role.to_string())
    .bind(lifecycle.canceled_by().map(Json))
    .bind(lifecycle.created_at())
    .bind(lifecycle.scheduled_to_run_at())
    .bind(lifecycle.queued_at())
    .bind(lifecycle.started_at())
    .bind(lifecycle.terminated_at())
    .bind(instance.idempotency_key().map(IdempotencyKey::as_str))
    .bind(instance.actor_message_id().map(ActorMessageId::as_str))
    .bind(instance.transaction_id().map(TransactionId::as_str))
    .bind(instance.metering_point_id().map(MeteringPointId::as_str))
    .bind(instance.row_version().value())
    .execute(&mut **tx)
    .await
    .map_err(|error| {
        let key = instance
            .idempotency_key()
            .map(ToString::to_string)
            .unwrap_or_else(|| instance.id().to_string());
        map_unique_violation(error, entities::ORCHESTRATION_INSTANCE, key)
    })?;

    for step in instance.steps() {
        let step_lifecycle = step.lifecycle();
        sqlx::query(
            "INSERT INTO step_instances \
             (id, orchestration_instance_id, sequence, description, can_be_skipped, \
              lifecycle_state, lifecycle_termination_state, started_at, terminated_at, custom_state) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(step.id().as_uuid())
        .bind(instance.id().as_uuid())
        .bind(step.sequence())
        .bind(step.description())
        .bind(step.can_be_skipped())
        .bind(step_lifecycle.state().to_string())
        .bind(step_lifecycle.termination_state().map(|state| state.to_string()))
        .bind(step_lifecycle.started_at())
        .bind(step_lifecycle.terminated_at())
        .bind(step.custom_state().serialized_value())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn update_instance(
    tx: &mut Transaction<'_, Postgres>,
    instance: &OrchestrationInstance,
    expected_version: RowVersion,
) -> Result<()> {
    let lifecycle = instance.lifecycle();
    let result = sqlx::query(
        "UPDATE orchestration_instances SET \
         custom_state = $3, lifecycle_state = $4, lifecycle_termination_state = $5, \
         canceled_by = $6, scheduled_to_run_at = $7, queued_at = $8, started_at = $9, \
         terminated_at = $10, row_version = $11 \
         WHERE id = $1 AND row_version = $2",
    )
    .bind(instance.id().as_uuid())
    .bind(expected_version.value())
    .bind(instance.custom_state().serialized_value())
    .bind(lifecycle.state().to_string())
    .bind(lifecycle.termination_state().map(|state| state.to_string()))
    .bind(lifecycle.canceled_by().map(Json))
    .bind(lifecycle.scheduled_to_run_at())
    .bind(lifecycle.queued_at())
    .bind(lifecycle.started_at())
    .bind(lifecycle.terminated_at())
    .bind(instance.row_version().value())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ProcessManagerError::concurrency_conflict(
            entities::ORCHESTRATION_INSTANCE,
            instance.id(),
        ));
    }

    for step in instance.steps() {
        let step_lifecycle = step.lifecycle();
        sqlx::query(
            "UPDATE step_instances SET \
             lifecycle_state = $2, lifecycle_termination_state = $3, started_at = $4, \
             terminated_at = $5, custom_state = $6 \
             WHERE id = $1",
        )
        .bind(step.id().as_uuid())
        .bind(step_lifecycle.state().to_string())
        .bind(step_lifecycle.termination_state().map(|state| state.to_string()))
        .bind(step_lifecycle.started_at())
        .bind(step_lifecycle.terminated_at())
        .bind(step.custom_state().serialized_value())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Query scope over `orchestration_instances` joined to their description.
struct InstanceScope {
    query: QueryBuilder<'static, Postgres>,
    has_conditions: bool,
}

impl InstanceScope {
    fn new() -> Self {
        let query = QueryBuilder::new(
            "SELECT i.id, i.orchestration_description_id, i.parameter_value, i.custom_state, \
             i.lifecycle_state, i.lifecycle_termination_state, i.created_by, i.canceled_by, \
             i.created_at, i.scheduled_to_run_at, i.queued_at, i.started_at, i.terminated_at, \
             i.idempotency_key, i.actor_message_id, i.transaction_id, i.metering_point_id, \
             i.row_version \
             FROM orchestration_instances i \
             JOIN orchestration_descriptions d ON d.id = i.orchestration_description_id",
        );
        Self {
            query,
            has_conditions: false,
        }
    }

    fn add_condition(&mut self, condition: &str) {
        if self.has_conditions {
            self.query.push(" AND ");
        } else {
            self.query.push(" WHERE ");
            self.has_conditions = true;
        }
        self.query.push(condition);
    }

    fn with_id(mut self, id: OrchestrationInstanceId) -> Self {
        self.add_condition("i.id = ");
        self.query.push_bind(id.as_uuid());
        self
    }

    fn with_idempotency_key(mut self, key: &IdempotencyKey) -> Self {
        self.add_condition("i.idempotency_key = ");
        self.query.push_bind(key.as_str().to_string());
        self
    }

    fn with_description_name(mut self, name: &str) -> Self {
        self.add_condition("d.name = ");
        self.query.push_bind(name.to_string());
        self
    }

    fn with_description_names(mut self, names: Vec<String>) -> Self {
        self.add_condition("d.name = ANY(");
        self.query.push_bind(names).push(")");
        self
    }

    fn with_description_version(mut self, version: i32) -> Self {
        self.add_condition("d.version = ");
        self.query.push_bind(version);
        self
    }

    fn in_states(mut self, states: &[OrchestrationInstanceLifecycleState]) -> Self {
        let states: Vec<String> = states.iter().map(ToString::to_string).collect();
        self.add_condition("i.lifecycle_state = ANY(");
        self.query.push_bind(states).push(")");
        self
    }

    fn with_termination_state(mut self, termination_state: String) -> Self {
        self.add_condition("i.lifecycle_termination_state = ");
        self.query.push_bind(termination_state);
        self
    }

    fn scheduled_at_or_before(mut self, at: DateTime<Utc>) -> Self {
        self.add_condition("i.scheduled_to_run_at <= ");
        self.query.push_bind(at);
        self
    }

    /// `column` is always one of the fixed lifecycle timestamp columns.
    fn timestamp_at_or_later(mut self, column: &'static str, at: DateTime<Utc>) -> Self {
        self.add_condition(&format!("i.{column} >= "));
        self.query.push_bind(at);
        self
    }

    fn timestamp_at_or_earlier(mut self, column: &'static str, at: DateTime<Utc>) -> Self {
        self.add_condition(&format!("i.{column} <= "));
        self.query.push_bind(at);
        self
    }

    fn activated_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.add_condition("((i.queued_at >= ");
        self.query
            .push_bind(from)
            .push(" AND i.queued_at <= ")
            .push_bind(to)
            .push(") OR (i.scheduled_to_run_at >= ")
            .push_bind(from)
            .push(" AND i.scheduled_to_run_at <= ")
            .push_bind(to)
            .push("))");
        self
    }

    fn created_by_actor_number(mut self, number: &str) -> Self {
        self.add_condition("i.created_by_actor_number = ");
        self.query.push_bind(number.to_string());
        self
    }

    fn created_by_actor_role(mut self, role: String) -> Self {
        self.add_condition("i.created_by_actor_role = ");
        self.query.push_bind(role);
        self
    }

    fn ordered_by_creation(mut self) -> Self {
        self.query.push(" ORDER BY i.created_at ASC, i.id ASC");
        self
    }

    fn ordered_by_scheduled_time(mut self) -> Self {
        self.query.push(" ORDER BY i.scheduled_to_run_at ASC, i.id ASC");
        self
    }

    async fn all(mut self, pool: &PgPool) -> Result<Vec<InstanceRow>> {
        Ok(self.query.build_query_as::<InstanceRow>().fetch_all(pool).await?)
    }
}

#[derive(Debug, FromRow)]
struct DescriptionRow {
    id: Uuid,
    name: String,
    version: i32,
    can_be_scheduled: bool,
    recurring_cron_expression: String,
    function_name: String,
    parameter_definition: String,
    host_name: String,
    is_enabled: bool,
    is_under_development: bool,
    row_version: i64,
}

impl DescriptionRow {
    fn into_description(self, steps: Vec<StepDescriptionRow>) -> Result<OrchestrationDescription> {
        let steps = steps
            .into_iter()
            .map(|step| {
                StepDescription::new(
                    step.sequence,
                    step.description,
                    step.can_be_skipped,
                    step.skip_reason,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OrchestrationDescription {
            id: OrchestrationDescriptionId::from_uuid(self.id),
            unique_name: OrchestrationDescriptionUniqueName::new(self.name, self.version)?,
            can_be_scheduled: self.can_be_scheduled,
            recurring_cron_expression: self.recurring_cron_expression,
            function_name: self.function_name,
            parameter_definition: ParameterDefinition::from_serialized(&self.parameter_definition)?,
            steps,
            host_name: self.host_name,
            is_enabled: self.is_enabled,
            is_under_development: self.is_under_development,
            row_version: RowVersion::new(self.row_version),
        })
    }
}

#[derive(Debug, FromRow)]
struct StepDescriptionRow {
    orchestration_description_id: Uuid,
    sequence: i32,
    description: String,
    can_be_skipped: bool,
    skip_reason: String,
}

#[derive(Debug, FromRow)]
struct InstanceRow {
    id: Uuid,
    orchestration_description_id: Uuid,
    parameter_value: String,
    custom_state: String,
    lifecycle_state: String,
    lifecycle_termination_state: Option<String>,
    created_by: Json<OperatingIdentity>,
    canceled_by: Option<Json<OperatingIdentity>>,
    created_at: DateTime<Utc>,
    scheduled_to_run_at: Option<DateTime<Utc>>,
    queued_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    terminated_at: Option<DateTime<Utc>>,
    idempotency_key: Option<String>,
    actor_message_id: Option<String>,
    transaction_id: Option<String>,
    metering_point_id: Option<String>,
    row_version: i64,
}

impl InstanceRow {
    fn into_instance(self, steps: Vec<StepInstanceRow>) -> Result<OrchestrationInstance> {
        let steps = steps
            .into_iter()
            .map(StepInstanceRow::into_step)
            .collect::<Result<Vec<_>>>()?;

        Ok(OrchestrationInstance {
            id: OrchestrationInstanceId::from_uuid(self.id),
            orchestration_description_id: OrchestrationDescriptionId::from_uuid(
                self.orchestration_description_id,
            ),
            parameter_value: ParameterValue::from_serialized(self.parameter_value)?,
            custom_state: CustomState::from_serialized(self.custom_state)?,
            lifecycle: OrchestrationInstanceLifecycle {
                state: parse_column("lifecycle_state", &self.lifecycle_state)?,
                termination_state: self
                    .lifecycle_termination_state
                    .as_deref()
                    .map(|value| parse_column("lifecycle_termination_state", value))
                    .transpose()?,
                created_by: self.created_by.0,
                canceled_by: self.canceled_by.map(|identity| identity.0),
                created_at: self.created_at,
                scheduled_to_run_at: self.scheduled_to_run_at,
                queued_at: self.queued_at,
                started_at: self.started_at,
                terminated_at: self.terminated_at,
            },
            idempotency_key: self.idempotency_key.map(IdempotencyKey::new).transpose()?,
            actor_message_id: self.actor_message_id.map(ActorMessageId::new).transpose()?,
            transaction_id: self.transaction_id.map(TransactionId::new).transpose()?,
            metering_point_id: self.metering_point_id.map(MeteringPointId::new).transpose()?,
            steps,
            row_version: RowVersion::new(self.row_version),
        })
    }
}

#[derive(Debug, FromRow)]
struct StepInstanceRow {
    id: Uuid,
    orchestration_instance_id: Uuid,
    sequence: i32,
    description: String,
    can_be_skipped: bool,
    lifecycle_state: String,
    lifecycle_termination_state: Option<String>,
    started_at: Option<DateTime<Utc>>,
    terminated_at: Option<DateTime<Utc>>,
    custom_state: String,
}

impl StepInstanceRow {
    fn into_step(self) -> Result<StepInstance> {
        Ok(StepInstance {
            id: StepInstanceId::from_uuid(self.id),
            sequence: self.sequence,
            description: self.description,
            can_be_skipped: self.can_be_skipped,
            lifecycle: StepInstanceLifecycle {
                state: parse_column("step lifecycle_state", &self.lifecycle_state)?,
                termination_state: self
                    .lifecycle_termination_state
                    .as_deref()
                    .map(|value| parse_column("step lifecycle_termination_state", value))
                    .transpose()?,
                started_at: self.started_at,
                terminated_at: self.terminated_at,
            },
            custom_state: CustomState::from_serialized(self.custom_state)?,
        })
    }
}

fn parse_column<T>(column: &str, value: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(|error: String| {
        ProcessManagerError::DatabaseError(format!("Invalid value in column {column}: {error}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::RegisterConfig;
    use crate::database::UnitOfWork;
    use crate::models::{Actor, ActorNumber, ActorRole};
    use crate::orchestration::{
        InMemoryExecutionEngine, OrchestrationInstanceManager, StartOrchestrationInstanceRequest,
    };
    use crate::registry::OrchestrationRegister;
    use crate::state_machine::OrchestrationInstanceTerminationState;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const HOST_NAME: &str = "pg-host";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap()
    }

    fn created_by() -> OperatingIdentity {
        OperatingIdentity::actor(Actor::new(
            ActorNumber::new("5790000000001").unwrap(),
            ActorRole::GridAccessProvider,
        ))
    }

    fn description(function_name: &str, steps: &[&str]) -> OrchestrationDescription {
        let mut description = OrchestrationDescription::new(
            OrchestrationDescriptionUniqueName::new("BRS_021_ForwardMeteredData", 1).unwrap(),
            true,
            function_name,
        );
        for step in steps {
            description.append_step_description(*step, false, "").unwrap();
        }
        description
    }

    async fn registered(store: Arc<PgStore>, description: &OrchestrationDescription) {
        OrchestrationRegister::new(store, RegisterConfig::default())
            .register_or_update(description, HOST_NAME)
            .await
            .unwrap();
    }

    fn new_instance(description: &OrchestrationDescription) -> OrchestrationInstance {
        OrchestrationInstance::create_from_description(
            description,
            created_by(),
            ParameterValue::empty(),
            &BTreeSet::new(),
            now(),
            None,
        )
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_activity_window_matches_queued_or_scheduled_time(pool: PgPool) {
        let store = Arc::new(PgStore::new(pool));
        let declared = description("Orchestration_Brs_021_V1", &["Validate"]);
        registered(store.clone(), &declared).await;
        let manager = OrchestrationInstanceManager::new(
            store.clone(),
            Arc::new(InMemoryExecutionEngine::new()),
            Arc::new(FixedClock::new(now())),
        );
        let request = || {
            StartOrchestrationInstanceRequest::new(
                declared.unique_name().clone(),
                created_by(),
                ParameterValue::empty(),
            )
        };

        let queued = manager.start_new_orchestration_instance(request()).await.unwrap();
        let scheduled = manager
            .schedule_new_orchestration_instance(request(), now() + Duration::minutes(1))
            .await
            .unwrap();
        let outside = manager
            .schedule_new_orchestration_instance(request(), now() + Duration::minutes(10))
            .await
            .unwrap();

        let criteria = ActorActivitySearch::new(
            [declared.unique_name().name()],
            now(),
            now() + Duration::minutes(2),
        )
        .with_created_by_actor_role(ActorRole::GridAccessProvider);
        let found: Vec<_> = store
            .search_actor_activity(&criteria)
            .await
            .unwrap()
            .iter()
            .map(OrchestrationInstance::id)
            .collect();

        assert_eq!(found.len(), 2);
        assert!(found.contains(&queued));
        assert!(found.contains(&scheduled));
        assert!(!found.contains(&outside));

        let due: Vec<_> = store
            .find_scheduled(now() + Duration::minutes(5))
            .await
            .unwrap()
            .iter()
            .map(OrchestrationInstance::id)
            .collect();
        assert_eq!(due, vec![scheduled]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_search_filters_and_round_trip(pool: PgPool) {
        let store = Arc::new(PgStore::new(pool));
        let declared = description("Orchestration_Brs_021_V1", &["Validate", "Enqueue"]);
        registered(store.clone(), &declared).await;

        let mut instance = new_instance(&declared);
        let mut unit_of_work = UnitOfWork::new(store.clone());
        unit_of_work.add_instance(&instance);
        unit_of_work.commit().await.unwrap();

        instance.lifecycle_mut().transition_to_queued(now()).unwrap();
        instance.lifecycle_mut().transition_to_running(now()).unwrap();
        instance
            .step_mut(1)
            .unwrap()
            .transition_to_running(now())
            .unwrap();
        instance
            .lifecycle_mut()
            .transition_to_failed(now() + Duration::minutes(3))
            .unwrap();
        let mut unit_of_work = UnitOfWork::new(store.clone());
        unit_of_work.update_instance(&mut instance);
        unit_of_work.commit().await.unwrap();

        let stored = store.get_instance(instance.id()).await.unwrap().unwrap();
        assert_eq!(stored, instance);

        let name = declared.unique_name().name();
        let failed = store
            .search_instances(
                &OrchestrationInstanceSearch::new(name)
                    .with_version(1)
                    .with_termination_state(OrchestrationInstanceTerminationState::Failed)
                    .with_terminated_at_or_earlier(now() + Duration::minutes(3)),
            )
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);

        let succeeded = store
            .search_instances(
                &OrchestrationInstanceSearch::new(name)
                    .with_termination_state(OrchestrationInstanceTerminationState::Succeeded),
            )
            .await
            .unwrap();
        assert!(succeeded.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_stale_update_is_a_concurrency_conflict(pool: PgPool) {
        let store = Arc::new(PgStore::new(pool));
        let declared = description("Orchestration_Brs_021_V1", &["Validate"]);
        registered(store.clone(), &declared).await;

        let instance = new_instance(&declared);
        let mut unit_of_work = UnitOfWork::new(store.clone());
        unit_of_work.add_instance(&instance);
        unit_of_work.commit().await.unwrap();

        let mut first = store.get_instance(instance.id()).await.unwrap().unwrap();
        let mut stale = first.clone();

        first.lifecycle_mut().transition_to_queued(now()).unwrap();
        let mut unit_of_work = UnitOfWork::new(store.clone());
        unit_of_work.update_instance(&mut first);
        unit_of_work.commit().await.unwrap();

        stale.lifecycle_mut().transition_to_queued(now()).unwrap();
        let mut unit_of_work = UnitOfWork::new(store.clone());
        unit_of_work.update_instance(&mut stale);
        let err = unit_of_work.commit().await.unwrap_err();

        assert!(err.is_concurrency_conflict());
        let stored = store.get_instance(instance.id()).await.unwrap().unwrap();
        assert_eq!(stored.row_version(), first.row_version());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_idempotency_key_is_rejected(pool: PgPool) {
        let store = Arc::new(PgStore::new(pool));
        let declared = description("Orchestration_Brs_021_V1", &["Validate"]);
        registered(store.clone(), &declared).await;
        let key = IdempotencyKey::new("actor-message-1").unwrap();

        let first = new_instance(&declared).with_idempotency_key(Some(key.clone()));
        let mut unit_of_work = UnitOfWork::new(store.clone());
        unit_of_work.add_instance(&first);
        unit_of_work.commit().await.unwrap();

        let second = new_instance(&declared).with_idempotency_key(Some(key.clone()));
        let mut unit_of_work = UnitOfWork::new(store.clone());
        unit_of_work.add_instance(&second);
        let err = unit_of_work.commit().await.unwrap_err();

        assert!(err.is_duplicate_key());
        let stored = store
            .get_instance_by_idempotency_key(&key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id(), first.id());
        assert!(store.get_instance(second.id()).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_breaking_change_overwrite_rewrites_steps(pool: PgPool) {
        let store = Arc::new(PgStore::new(pool));
        let permissive = OrchestrationRegister::new(
            store.clone(),
            RegisterConfig {
                allow_orchestration_description_breaking_changes: true,
            },
        );
        let existing = description("Orchestration_Brs_021_V1", &["Validate", "Enqueue", "Notify"]);
        permissive.register_or_update(&existing, HOST_NAME).await.unwrap();

        let redefined = description("Orchestration_Brs_021_V1b", &["Forward"]);
        permissive
            .register_or_update(&redefined, HOST_NAME)
            .await
            .unwrap();

        let stored = store
            .get_description_by_unique_name(existing.unique_name(), Some(true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id(), existing.id());
        assert_eq!(stored.function_name(), "Orchestration_Brs_021_V1b");
        assert_eq!(stored.steps(), redefined.steps());

        let strict = OrchestrationRegister::new(store.clone(), RegisterConfig::default());
        let err = strict
            .register_or_update(&existing, HOST_NAME)
            .await
            .unwrap_err();
        assert!(err.is_invalid_operation());
        let unchanged = store.get_description(existing.id()).await.unwrap().unwrap();
        assert_eq!(unchanged.steps().len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_unique_name_is_rejected(pool: PgPool) {
        let store = Arc::new(PgStore::new(pool));
        let first = description("Orchestration_Brs_021_V1", &["Validate"]);
        let second = description("Orchestration_Brs_021_V1", &["Validate"]);

        let mut unit_of_work = UnitOfWork::new(store.clone());
        unit_of_work.add_description(&first);
        unit_of_work.commit().await.unwrap();

        let mut unit_of_work = UnitOfWork::new(store.clone());
        unit_of_work.add_description(&second);
        let err = unit_of_work.commit().await.unwrap_err();

        assert!(err.is_duplicate_key());
    }
}
