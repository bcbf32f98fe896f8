//! Builders for orchestration descriptions and start requests.

use process_manager::models::{
    OperatingIdentity, OrchestrationDescription, OrchestrationDescriptionUniqueName,
    ParameterDefinition, ParameterValue,
};
use process_manager::orchestration::StartOrchestrationInstanceRequest;
use serde_json::Value;

/// Builder pattern for creating test OrchestrationDescriptions
pub struct DescriptionBuilder {
    name: String,
    version: i32,
    can_be_scheduled: bool,
    function_name: String,
    steps: Vec<(String, bool, String)>,
    cron_expression: Option<String>,
    parameter_schema: Option<Value>,
}

impl DescriptionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: 1,
            can_be_scheduled: false,
            function_name: format!("Orchestration_{name}_V1"),
            steps: Vec::new(),
            cron_expression: None,
            parameter_schema: None,
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn schedulable(mut self) -> Self {
        self.can_be_scheduled = true;
        self
    }

    pub fn with_function_name(mut self, function_name: &str) -> Self {
        self.function_name = function_name.to_string();
        self
    }

    pub fn with_step(mut self, description: &str) -> Self {
        self.steps.push((description.to_string(), false, String::new()));
        self
    }

    pub fn with_skippable_step(mut self, description: &str, skip_reason: &str) -> Self {
        self.steps
            .push((description.to_string(), true, skip_reason.to_string()));
        self
    }

    pub fn with_cron(mut self, expression: &str) -> Self {
        self.cron_expression = Some(expression.to_string());
        self
    }

    pub fn with_parameter_schema(mut self, schema: Value) -> Self {
        self.parameter_schema = Some(schema);
        self
    }

    pub fn unique_name(&self) -> OrchestrationDescriptionUniqueName {
        OrchestrationDescriptionUniqueName::new(self.name.clone(), self.version).unwrap()
    }

    pub fn build(self) -> OrchestrationDescription {
        let mut description =
            OrchestrationDescription::new(self.unique_name(), self.can_be_scheduled, self.function_name);
        for (step, can_be_skipped, skip_reason) in self.steps {
            description
                .append_step_description(step, can_be_skipped, skip_reason)
                .unwrap();
        }
        if let Some(expression) = self.cron_expression {
            description.set_recurring_cron_expression(expression).unwrap();
        }
        if let Some(schema) = self.parameter_schema {
            *description.parameter_definition_mut() = ParameterDefinition::from_schema(schema).unwrap();
        }
        description
    }
}

pub fn start_request(
    description: &OrchestrationDescription,
    created_by: OperatingIdentity,
) -> StartOrchestrationInstanceRequest {
    StartOrchestrationInstanceRequest::new(
        description.unique_name().clone(),
        created_by,
        ParameterValue::empty(),
    )
}
