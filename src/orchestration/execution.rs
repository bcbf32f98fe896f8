//! # Execution Engine Boundary
//!
//! The process manager records instances; something else runs them. This
//! module holds the trait the managers call to hand a queued instance to that
//! engine, plus an in-process implementation for tests and embedded hosts.
//!
//! Executions are keyed by the orchestration instance id, so an engine that
//! already knows an id reports `false` instead of starting a second run. That
//! composes with the idempotency-key check done before an instance is created.

use crate::error::Result;
use crate::models::{
    OrchestrationDescription, OrchestrationInstance, OrchestrationInstanceId, ParameterValue,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::Debug;
use tracing::debug;

/// Client for the engine that executes orchestration instances.
#[async_trait]
pub trait ExecutionEngineClient: Send + Sync + Debug {
    /// Ask the engine to start executing `instance_id`.
    ///
    /// Returns `true` when a new execution was started and `false` when the
    /// engine already had one for this id.
    async fn start_orchestration(
        &self,
        instance_id: OrchestrationInstanceId,
        function_name: &str,
        parameter_value: &ParameterValue,
    ) -> Result<bool>;

    /// Get the engine name for identification
    fn engine_name(&self) -> &'static str;
}

/// Dispatch `instance` when `description` is bound to an executable function.
///
/// Descriptions without a function name are driven manually by their
/// workflow code, so nothing is dispatched for them and `Ok(false)` is returned.
pub(crate) async fn dispatch_if_durable(
    engine: &dyn ExecutionEngineClient,
    description: &OrchestrationDescription,
    instance: &OrchestrationInstance,
) -> Result<bool> {
    if !description.is_durable_function() {
        debug!(
            instance_id = %instance.id(),
            unique_name = %description.unique_name(),
            "Description has no function name, skipping dispatch"
        );
        return Ok(false);
    }

    let started = engine
        .start_orchestration(
            instance.id(),
            description.function_name(),
            instance.parameter_value(),
        )
        .await?;

    debug!(
        instance_id = %instance.id(),
        function_name = %description.function_name(),
        engine = engine.engine_name(),
        started = started,
        "Dispatched orchestration instance"
    );
    Ok(started)
}

/// Record of one start request seen by [`InMemoryExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedExecution {
    pub instance_id: OrchestrationInstanceId,
    pub function_name: String,
    pub parameter_value: String,
}

/// Execution engine that only remembers what it was asked to start.
///
/// ```rust
/// use process_manager::models::{OrchestrationInstanceId, ParameterValue};
/// use process_manager::orchestration::{ExecutionEngineClient, InMemoryExecutionEngine};
///
/// # tokio_test::block_on(async {
/// let engine = InMemoryExecutionEngine::new();
/// let id = OrchestrationInstanceId::new();
///
/// assert!(engine.start_orchestration(id, "Orchestration_Brs_021_V1", &ParameterValue::empty()).await?);
/// assert!(!engine.start_orchestration(id, "Orchestration_Brs_021_V1", &ParameterValue::empty()).await?);
/// assert_eq!(engine.started().len(), 1);
/// # Ok::<(), process_manager::ProcessManagerError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryExecutionEngine {
    started: Mutex<Vec<StartedExecution>>,
    known_ids: Mutex<HashSet<OrchestrationInstanceId>>,
}

impl InMemoryExecutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executions started so far, in request order. Repeated requests are not included.
    pub fn started(&self) -> Vec<StartedExecution> {
        self.started.lock().clone()
    }

    pub fn has_started(&self, instance_id: OrchestrationInstanceId) -> bool {
        self.known_ids.lock().contains(&instance_id)
    }
}

#[async_trait]
impl ExecutionEngineClient for InMemoryExecutionEngine {
    async fn start_orchestration(
        &self,
        instance_id: OrchestrationInstanceId,
        function_name: &str,
        parameter_value: &ParameterValue,
    ) -> Result<bool> {
        if !self.known_ids.lock().insert(instance_id) {
            return Ok(false);
        }

        self.started.lock().push(StartedExecution {
            instance_id,
            function_name: function_name.to_string(),
            parameter_value: parameter_value.serialized_value().to_string(),
        });
        Ok(true)
    }

    fn engine_name(&self) -> &'static str {
        "InMemoryExecutionEngine"
    }
}
