//! Detection of breaking changes between two definitions of the same orchestration.
//!
//! A property is breaking when changing it in place would change how already
//! recorded instances are read: the steps, the function name, the parameter
//! schema and whether the orchestration can be scheduled. The recurring cron
//! expression and the under-development flag are refreshable without a new
//! version.

use crate::models::OrchestrationDescription;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepField {
    CanBeSkipped,
    Description,
    SkipReason,
    Sequence,
}

impl fmt::Display for StepField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CanBeSkipped => "CanBeSkipped",
            Self::Description => "Description",
            Self::SkipReason => "SkipReason",
            Self::Sequence => "Sequence",
        };
        f.write_str(name)
    }
}

/// A property that differs between the existing and the new definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangedProperty {
    StepCount,
    /// `index` is the zero-based position after ordering by sequence.
    Step { index: usize, field: StepField },
    FunctionName,
    ParameterDefinition,
    CanBeScheduled,
}

impl fmt::Display for ChangedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepCount => f.write_str("Steps.Count"),
            Self::Step { index, field } => write!(f, "Steps[{index}].{field}"),
            Self::FunctionName => f.write_str("FunctionName"),
            Self::ParameterDefinition => f.write_str("ParameterDefinition"),
            Self::CanBeScheduled => f.write_str("CanBeScheduled"),
        }
    }
}

/// Breaking properties that differ, in a stable order.
///
/// Steps are compared position by position, existing against new, over the
/// positions both definitions have.
pub fn get_properties_with_breaking_changes(
    existing: &OrchestrationDescription,
    new: &OrchestrationDescription,
) -> Vec<ChangedProperty> {
    let mut changed = Vec::new();

    if existing.steps().len() != new.steps().len() {
        changed.push(ChangedProperty::StepCount);
    }

    for (index, (existing_step, new_step)) in
        existing.steps().iter().zip(new.steps()).enumerate()
    {
        let mut step_changed = |field| changed.push(ChangedProperty::Step { index, field });
        if existing_step.can_be_skipped() != new_step.can_be_skipped() {
            step_changed(StepField::CanBeSkipped);
        }
        if existing_step.description() != new_step.description() {
            step_changed(StepField::Description);
        }
        if existing_step.skip_reason() != new_step.skip_reason() {
            step_changed(StepField::SkipReason);
        }
        if existing_step.sequence() != new_step.sequence() {
            step_changed(StepField::Sequence);
        }
    }

    if existing.function_name() != new.function_name() {
        changed.push(ChangedProperty::FunctionName);
    }
    if existing.parameter_definition().serialized() != new.parameter_definition().serialized() {
        changed.push(ChangedProperty::ParameterDefinition);
    }
    if existing.can_be_scheduled() != new.can_be_scheduled() {
        changed.push(ChangedProperty::CanBeScheduled);
    }

    changed
}

/// True if any property the register would write differs.
pub fn any_refreshable_property_has_changed(
    existing: &OrchestrationDescription,
    new: &OrchestrationDescription,
) -> bool {
    existing.recurring_cron_expression() != new.recurring_cron_expression()
        || existing.is_under_development() != new.is_under_development()
        || !get_properties_with_breaking_changes(existing, new).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrchestrationDescriptionUniqueName, ParameterDefinition};
    use serde_json::json;

    fn description(function_name: &str) -> OrchestrationDescription {
        let mut description = OrchestrationDescription::new(
            OrchestrationDescriptionUniqueName::new("BRS_023_027", 1).unwrap(),
            true,
            function_name,
        );
        description.append_step_description("Calculate", false, "").unwrap();
        description
            .append_step_description("Enqueue messages", true, "Internal calculation")
            .unwrap();
        description
    }

    #[test]
    fn test_identical_descriptions_have_no_changes() {
        assert!(get_properties_with_breaking_changes(&description("V1"), &description("V1")).is_empty());
        assert!(!any_refreshable_property_has_changed(&description("V1"), &description("V1")));
    }

    #[test]
    fn test_top_level_breaking_properties() {
        let existing = description("V1");
        let mut new = description("V2");
        new.set_can_be_scheduled(false);
        new.set_parameter_definition(
            ParameterDefinition::from_schema(json!({ "type": "object" })).unwrap(),
        );

        let changed = get_properties_with_breaking_changes(&existing, &new);
        assert_eq!(
            changed,
            vec![
                ChangedProperty::FunctionName,
                ChangedProperty::ParameterDefinition,
                ChangedProperty::CanBeScheduled,
            ]
        );
    }

    #[test]
    fn test_step_fields_are_compared_per_position() {
        let existing = description("V1");
        let mut new = OrchestrationDescription::new(
            existing.unique_name().clone(),
            true,
            "V1",
        );
        new.append_step_description("Calculate", false, "").unwrap();
        new.append_step_description("Enqueue messages", true, "Other reason")
            .unwrap();

        let changed = get_properties_with_breaking_changes(&existing, &new);
        assert_eq!(
            changed,
            vec![ChangedProperty::Step {
                index: 1,
                field: StepField::SkipReason
            }]
        );
        assert_eq!(changed[0].to_string(), "Steps[1].SkipReason");
    }

    #[test]
    fn test_cron_and_development_flag_are_refreshable_not_breaking() {
        let existing = description("V1");
        let mut new = description("V1");
        new.set_recurring_cron_expression("0 6 * * *").unwrap();
        new.set_is_under_development(true);

        assert!(get_properties_with_breaking_changes(&existing, &new).is_empty());
        assert!(any_refreshable_property_has_changed(&existing, &new));
    }
}
