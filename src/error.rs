//! Error types for the process manager core.
//!
//! Every failure is returned to the caller; nothing in the core logs-and-continues.
//! Callers distinguish the kinds they can recover from with the classifier
//! predicates below (for example, re-fetching after a concurrency conflict).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessManagerError {
    /// A "must exist" accessor found nothing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Malformed argument rejected at the point of mutation.
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Redefinition of an orchestration refused by the environment policy.
    #[error(
        "Breaking changes detected for orchestration description {unique_name}: {}",
        properties.join(", ")
    )]
    BreakingChanges {
        unique_name: String,
        properties: Vec<String>,
    },

    #[error("Invalid {entity} state transition: cannot {event} from state {from}")]
    StateTransitionError {
        entity: &'static str,
        from: String,
        event: String,
    },

    /// Optimistic concurrency token mismatch. Re-fetch and re-validate before retrying.
    #[error("Concurrency conflict on {entity} {id}: the row was modified by another writer")]
    ConcurrencyConflict { entity: &'static str, id: String },

    /// Store-level uniqueness constraint violation.
    #[error("Duplicate {entity} key: {key}")]
    DuplicateKey { entity: &'static str, key: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Execution engine error: {0}")]
    ExecutionEngineError(String),
}

impl ProcessManagerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn concurrency_conflict(entity: &'static str, id: impl ToString) -> Self {
        Self::ConcurrencyConflict {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for plain invalid operations, rejected breaking changes and illegal
    /// lifecycle transitions.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            Self::InvalidOperation(_) | Self::BreakingChanges { .. } | Self::StateTransitionError { .. }
        )
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

impl From<serde_json::Error> for ProcessManagerError {
    fn from(error: serde_json::Error) -> Self {
        ProcessManagerError::SerializationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for ProcessManagerError {
    fn from(err: sqlx::Error) -> Self {
        ProcessManagerError::DatabaseError(err.to_string())
    }
}

impl From<crate::config::ConfigurationError> for ProcessManagerError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        ProcessManagerError::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProcessManagerError>;
