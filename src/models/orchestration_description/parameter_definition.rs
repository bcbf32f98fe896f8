//! JSON-schema contract for an orchestration's input parameter.

use crate::error::{ProcessManagerError, Result};
use jsonschema::{Draft, JSONSchema};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

/// Schema an instance's parameter value must satisfy.
///
/// An empty definition places no constraint on the parameter value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterDefinition {
    schema: Option<Value>,
}

impl ParameterDefinition {
    /// Build a definition from an explicit schema document.
    pub fn from_schema(schema: Value) -> Result<Self> {
        compile(&schema)?;
        Ok(Self {
            schema: Some(schema),
        })
    }

    /// Restore a definition from its serialized form; the empty string means no definition.
    pub fn from_serialized(serialized: &str) -> Result<Self> {
        if serialized.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::from_schema(serde_json::from_str(serialized)?)
    }

    /// Replace the schema with one generated from the parameter type `T`.
    pub fn set_from_type<T: JsonSchema>(&mut self) -> Result<()> {
        let root = schemars::schema_for!(T);
        self.schema = Some(serde_json::to_value(root)?);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_none()
    }

    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    pub fn serialized(&self) -> String {
        self.schema
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_default()
    }

    /// Validate a serialized payload against the schema.
    pub fn is_valid_parameter_value(&self, serialized_value: &str) -> bool {
        let Some(schema) = &self.schema else {
            return true;
        };

        let Ok(instance) = serde_json::from_str::<Value>(serialized_value) else {
            return false;
        };

        match compile(schema) {
            Ok(compiled) => compiled.is_valid(&instance),
            Err(_) => false,
        }
    }

    /// Validate a typed parameter against the schema.
    pub fn is_valid_parameter<T: Serialize>(&self, parameter: &T) -> bool {
        match serde_json::to_string(parameter) {
            Ok(serialized) => self.is_valid_parameter_value(&serialized),
            Err(_) => false,
        }
    }
}

fn compile(schema: &Value) -> Result<JSONSchema> {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| {
            ProcessManagerError::ValidationError(format!("Invalid parameter definition schema: {e}"))
        })
}
