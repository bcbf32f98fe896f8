//! Five-field cron expressions (`minute hour day-of-month month day-of-week`).
//!
//! The `cron` crate parses the six/seven-field form with a leading seconds
//! field, so expressions are evaluated with seconds pinned to zero.
//!
//! Day-of-week follows standard cron numbering (0-7, Sunday is 0 or 7). The
//! `cron` crate numbers Sunday as 1, so numeric day-of-week values are
//! rewritten before parsing. Named days (`MON-FRI`) are passed through.

use crate::error::{ProcessManagerError, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::collections::BTreeSet;
use std::str::FromStr;

const CRON_FIELD_COUNT: usize = 5;
const DAY_OF_WEEK_FIELD: usize = 4;
const MAX_DAY_OF_WEEK: u32 = 7;

/// Parse and validate a five-field cron expression.
pub fn parse_cron_expression(expression: &str) -> Result<Schedule> {
    let field_count = expression.split_whitespace().count();
    if field_count != CRON_FIELD_COUNT {
        return Err(ProcessManagerError::ValidationError(format!(
            "Cron expression '{expression}' must have {CRON_FIELD_COUNT} fields, found {field_count}"
        )));
    }

    let invalid = |reason: String| {
        ProcessManagerError::ValidationError(format!(
            "Invalid cron expression '{expression}': {reason}"
        ))
    };

    let mut fields: Vec<String> = expression.split_whitespace().map(str::to_string).collect();
    fields[DAY_OF_WEEK_FIELD] =
        to_scheduler_day_of_week(&fields[DAY_OF_WEEK_FIELD]).map_err(invalid)?;

    Schedule::from_str(&format!("0 {}", fields.join(" "))).map_err(|e| invalid(e.to_string()))
}

/// Rewrite a standard day-of-week field (Sunday = 0 or 7) into the `cron`
/// crate's numbering (Sunday = 1, Saturday = 7).
///
/// Numeric items are expanded to an explicit list so that ranges ending on
/// Sunday (`1-7`) and steps (`*/2`) keep their meaning.
fn to_scheduler_day_of_week(field: &str) -> std::result::Result<String, String> {
    if field == "*" || field == "?" || field.chars().any(|c| c.is_ascii_alphabetic()) {
        return Ok(field.to_string());
    }

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, parse_day_step(step)?),
            None => (item, 1),
        };
        let (start, end) = match range {
            "*" => (0, 6),
            _ => match range.split_once('-') {
                Some((start, end)) => (parse_day(start)?, parse_day(end)?),
                None if item.contains('/') => (parse_day(range)?, 6),
                None => {
                    let day = parse_day(range)?;
                    (day, day)
                }
            },
        };
        if start > end {
            return Err(format!("day-of-week range '{range}' is descending"));
        }
        days.extend((start..=end).step_by(step).map(|day| day % 7 + 1));
    }

    Ok(days
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(","))
}

fn parse_day(value: &str) -> std::result::Result<u32, String> {
    match value.parse::<u32>() {
        Ok(day) if day <= MAX_DAY_OF_WEEK => Ok(day),
        _ => Err(format!("'{value}' is not a day of week (0-7)")),
    }
}

fn parse_day_step(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(step) if step > 0 => Ok(step),
        _ => Err(format!("'{value}' is not a valid day-of-week step")),
    }
}

pub fn is_valid_cron_expression(expression: &str) -> bool {
    parse_cron_expression(expression).is_ok()
}

/// Occurrences strictly after `after` and no later than `until`.
pub fn occurrences_between(
    expression: &str,
    after: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>> {
    let schedule = parse_cron_expression(expression)?;
    Ok(schedule
        .after(&after)
        .take_while(|occurrence| *occurrence <= until)
        .collect())
}
