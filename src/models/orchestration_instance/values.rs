//! Value objects carried on orchestration instances.

use crate::error::Result;
use crate::validation::{require_non_empty, validate_serialized_json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                require_non_empty($field, &value)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_identifier!(
    /// Caller-supplied token that makes instance creation idempotent.
    IdempotencyKey,
    "IdempotencyKey"
);
string_identifier!(
    /// Id of the actor message that triggered the instance.
    ActorMessageId,
    "ActorMessageId"
);
string_identifier!(
    /// Business transaction id of the triggering request.
    TransactionId,
    "TransactionId"
);
string_identifier!(MeteringPointId, "MeteringPointId");

/// Serialized input of an orchestration instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterValue {
    serialized_value: String,
}

impl ParameterValue {
    pub fn from_parameter<T: Serialize>(parameter: &T) -> Result<Self> {
        Self::from_serialized(serde_json::to_string(parameter)?)
    }

    pub fn from_serialized(serialized_value: impl Into<String>) -> Result<Self> {
        let serialized_value = serialized_value.into();
        validate_serialized_json("ParameterValue", &serialized_value)?;
        Ok(Self { serialized_value })
    }

    /// The empty JSON object, for orchestrations without input.
    pub fn empty() -> Self {
        Self {
            serialized_value: "{}".to_string(),
        }
    }

    pub fn serialized_value(&self) -> &str {
        &self.serialized_value
    }

    pub fn as_parameter<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.serialized_value)?)
    }
}

/// Free-form serialized state an orchestration carries between activities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomState {
    serialized_value: String,
}

impl CustomState {
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        Self::from_serialized(serde_json::to_string(value)?)
    }

    /// The empty string clears the state.
    pub fn from_serialized(serialized_value: impl Into<String>) -> Result<Self> {
        let serialized_value = serialized_value.into();
        if !serialized_value.is_empty() {
            validate_serialized_json("CustomState", &serialized_value)?;
        }
        Ok(Self { serialized_value })
    }

    pub fn is_empty(&self) -> bool {
        self.serialized_value.is_empty()
    }

    pub fn serialized_value(&self) -> &str {
        &self.serialized_value
    }

    /// Deserialize the state; `None` when no state has been set.
    pub fn as_value<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&self.serialized_value)?))
    }
}
