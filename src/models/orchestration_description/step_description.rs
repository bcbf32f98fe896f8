use crate::error::{ProcessManagerError, Result};

/// A declared stage of an orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescription {
    sequence: i32,
    description: String,
    can_be_skipped: bool,
    skip_reason: String,
}

impl StepDescription {
    /// A skippable step must say why it may be skipped.
    pub fn new(
        sequence: i32,
        description: impl Into<String>,
        can_be_skipped: bool,
        skip_reason: impl Into<String>,
    ) -> Result<Self> {
        if sequence < 1 {
            return Err(ProcessManagerError::ValidationError(format!(
                "Step sequence must be 1 or greater, got {sequence}"
            )));
        }

        let skip_reason = skip_reason.into();
        if can_be_skipped && skip_reason.trim().is_empty() {
            return Err(ProcessManagerError::ValidationError(format!(
                "Step {sequence} can be skipped but has no skip reason"
            )));
        }

        Ok(Self {
            sequence,
            description: description.into(),
            can_be_skipped,
            skip_reason,
        })
    }

    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn can_be_skipped(&self) -> bool {
        self.can_be_skipped
    }

    pub fn skip_reason(&self) -> &str {
        &self.skip_reason
    }
}
