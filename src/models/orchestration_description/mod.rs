//! # Orchestration Description
//!
//! A named, versioned definition of an orchestration: its steps, the schema of
//! its input parameter, whether it may be scheduled and how it recurs.
//!
//! Descriptions are never physically deleted. Deregistration disables them so
//! that execution history keeps pointing at the definition it was created from.

pub mod cron_expression;
pub mod parameter_definition;
pub mod step_description;

pub use parameter_definition::ParameterDefinition;
pub use step_description::StepDescription;

use crate::error::{ProcessManagerError, Result};
use crate::models::RowVersion;
use crate::validation::require_non_empty;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, immutable identity of a description row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrchestrationDescriptionId(Uuid);

impl OrchestrationDescriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrchestrationDescriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrchestrationDescriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Natural key of an orchestration: two descriptions are the same
/// orchestration iff name and version both match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrchestrationDescriptionUniqueName {
    name: String,
    version: i32,
}

impl OrchestrationDescriptionUniqueName {
    pub fn new(name: impl Into<String>, version: i32) -> Result<Self> {
        let name = name.into();
        require_non_empty("Orchestration name", &name)?;
        if version < 1 {
            return Err(ProcessManagerError::ValidationError(format!(
                "Orchestration version must be 1 or greater, got {version}"
            )));
        }
        Ok(Self { name, version })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> i32 {
        self.version
    }
}

impl fmt::Display for OrchestrationDescriptionUniqueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// A versioned orchestration definition.
///
/// Steps can only be appended one at a time or replaced wholesale, so their
/// sequence numbers always run 1..=n in order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationDescription {
    pub(crate) id: OrchestrationDescriptionId,
    pub(crate) unique_name: OrchestrationDescriptionUniqueName,
    pub(crate) can_be_scheduled: bool,
    pub(crate) recurring_cron_expression: String,
    pub(crate) function_name: String,
    pub(crate) parameter_definition: ParameterDefinition,
    pub(crate) steps: Vec<StepDescription>,
    pub(crate) host_name: String,
    pub(crate) is_enabled: bool,
    pub(crate) is_under_development: bool,
    pub(crate) row_version: RowVersion,
}

impl OrchestrationDescription {
    pub fn new(
        unique_name: OrchestrationDescriptionUniqueName,
        can_be_scheduled: bool,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            id: OrchestrationDescriptionId::new(),
            unique_name,
            can_be_scheduled,
            recurring_cron_expression: String::new(),
            function_name: function_name.into(),
            parameter_definition: ParameterDefinition::default(),
            steps: Vec::new(),
            host_name: String::new(),
            is_enabled: true,
            is_under_development: false,
            row_version: RowVersion::default(),
        }
    }

    pub fn id(&self) -> OrchestrationDescriptionId {
        self.id
    }

    pub fn unique_name(&self) -> &OrchestrationDescriptionUniqueName {
        &self.unique_name
    }

    pub fn can_be_scheduled(&self) -> bool {
        self.can_be_scheduled
    }

    pub fn recurring_cron_expression(&self) -> &str {
        &self.recurring_cron_expression
    }

    /// Set or clear (empty string) the recurrence; an invalid expression leaves the current value untouched.
    pub fn set_recurring_cron_expression(&mut self, expression: impl Into<String>) -> Result<()> {
        let expression = expression.into();
        if !expression.is_empty() {
            cron_expression::parse_cron_expression(&expression)?;
        }
        self.recurring_cron_expression = expression;
        Ok(())
    }

    pub fn is_recurring(&self) -> bool {
        !self.recurring_cron_expression.is_empty()
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn is_durable_function(&self) -> bool {
        !self.function_name.is_empty()
    }

    pub fn parameter_definition(&self) -> &ParameterDefinition {
        &self.parameter_definition
    }

    pub fn parameter_definition_mut(&mut self) -> &mut ParameterDefinition {
        &mut self.parameter_definition
    }

    pub fn steps(&self) -> &[StepDescription] {
        &self.steps
    }

    pub fn step(&self, sequence: i32) -> Option<&StepDescription> {
        self.steps.iter().find(|step| step.sequence() == sequence)
    }

    /// Append a step; its sequence is the next in order.
    pub fn append_step_description(
        &mut self,
        description: impl Into<String>,
        can_be_skipped: bool,
        skip_reason: impl Into<String>,
    ) -> Result<&StepDescription> {
        let sequence = self.next_sequence()?;
        let step = StepDescription::new(sequence, description, can_be_skipped, skip_reason)?;
        self.steps.push(step);
        Ok(&self.steps[self.steps.len() - 1])
    }

    /// Replace all steps. The replacement is ordered by sequence and must run 1..=n.
    pub fn overwrite_steps(&mut self, steps: Vec<StepDescription>) -> Result<()> {
        let mut steps = steps;
        steps.sort_by_key(StepDescription::sequence);

        for (index, step) in steps.iter().enumerate() {
            let expected = index as i32 + 1;
            if step.sequence() != expected {
                return Err(ProcessManagerError::ValidationError(format!(
                    "Step sequences must be contiguous from 1: expected {expected}, found {}",
                    step.sequence()
                )));
            }
        }

        self.steps = steps;
        Ok(())
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn is_under_development(&self) -> bool {
        self.is_under_development
    }

    pub fn set_is_under_development(&mut self, is_under_development: bool) {
        self.is_under_development = is_under_development;
    }

    pub fn row_version(&self) -> RowVersion {
        self.row_version
    }

    pub(crate) fn set_host_name(&mut self, host_name: &str) -> Result<()> {
        require_non_empty("HostName", host_name)?;
        self.host_name = host_name.to_string();
        Ok(())
    }

    pub(crate) fn set_is_enabled(&mut self, is_enabled: bool) {
        self.is_enabled = is_enabled;
    }

    pub(crate) fn set_can_be_scheduled(&mut self, can_be_scheduled: bool) {
        self.can_be_scheduled = can_be_scheduled;
    }

    pub(crate) fn set_function_name(&mut self, function_name: &str) {
        self.function_name = function_name.to_string();
    }

    pub(crate) fn set_parameter_definition(&mut self, definition: ParameterDefinition) {
        self.parameter_definition = definition;
    }

    pub(crate) fn set_row_version(&mut self, row_version: RowVersion) {
        self.row_version = row_version;
    }

    fn next_sequence(&self) -> Result<i32> {
        i32::try_from(self.steps.len() + 1).map_err(|_| {
            ProcessManagerError::ValidationError("Too many step descriptions".to_string())
        })
    }
}
