//! Input validation shared by the domain model.
//!
//! Serialized JSON carried on instances (parameter values, custom state) is
//! bounded in size and depth before it is accepted.

use crate::error::{ProcessManagerError, Result};
use serde_json::Value;

/// Maximum allowed size for serialized JSON payloads (1MB)
const MAX_JSON_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum nesting depth for JSON objects/arrays
const MAX_JSON_DEPTH: usize = 32;

/// Rejects empty or whitespace-only values for required strings.
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProcessManagerError::ValidationError(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

/// Parses a serialized JSON payload and checks its size and nesting.
pub fn validate_serialized_json(field: &str, serialized: &str) -> Result<Value> {
    if serialized.len() > MAX_JSON_SIZE_BYTES {
        return Err(ProcessManagerError::ValidationError(format!(
            "{field} too large: {} bytes (max: {MAX_JSON_SIZE_BYTES})",
            serialized.len()
        )));
    }

    let value: Value = serde_json::from_str(serialized).map_err(|e| {
        ProcessManagerError::ValidationError(format!("{field} is not valid JSON: {e}"))
    })?;

    validate_json_depth(field, &value, 0)?;
    Ok(value)
}

fn validate_json_depth(field: &str, value: &Value, current_depth: usize) -> Result<()> {
    if current_depth > MAX_JSON_DEPTH {
        return Err(ProcessManagerError::ValidationError(format!(
            "{field} nesting too deep (max: {MAX_JSON_DEPTH})"
        )));
    }

    match value {
        Value::Object(map) => {
            for val in map.values() {
                validate_json_depth(field, val, current_depth + 1)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                validate_json_depth(field, item, current_depth + 1)?;
            }
        }
        _ => {}
    }

    Ok(())
}
