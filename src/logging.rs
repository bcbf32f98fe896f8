//! # Structured Logging Module
//!
//! Environment-aware structured logging for the process manager. Output goes
//! to the console, as JSON when `PROCESS_MANAGER_LOG_FORMAT=json`.

use crate::config::detect_environment;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

const LOG_FORMAT_VARIABLE: &str = "PROCESS_MANAGER_LOG_FORMAT";

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs a subscriber, and
/// an already installed global subscriber is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let filter = std::env::var("RUST_LOG")
            .ok()
            .filter(|directives| !directives.is_empty())
            .unwrap_or_else(|| get_log_level(&environment).to_string());
        let json = std::env::var(LOG_FORMAT_VARIABLE)
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(EnvFilter::new(filter))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(filter))
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            json = json,
            "Structured logging initialized"
        );
    });
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for register operations
pub fn log_register_operation(
    operation: &str,
    unique_name: &str,
    host_name: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        unique_name = %unique_name,
        host_name = host_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "REGISTER_OPERATION"
    );
}

/// Log structured data for orchestration instance operations
pub fn log_instance_operation(
    operation: &str,
    instance_id: &str,
    unique_name: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        instance_id = %instance_id,
        unique_name = unique_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "INSTANCE_OPERATION"
    );
}

/// Log structured data for step operations
pub fn log_step_operation(
    operation: &str,
    instance_id: &str,
    step_sequence: i32,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        instance_id = %instance_id,
        step_sequence = step_sequence,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "STEP_OPERATION"
    );
}
