//! Process manager constants.

/// Environment variables consulted, in order, to pick the runtime environment.
pub const ENVIRONMENT_VARIABLES: [&str; 2] = ["PROCESS_MANAGER_ENV", "APP_ENV"];

/// Default environment when none is set.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Prefix for environment variable configuration overrides.
pub const CONFIG_ENV_PREFIX: &str = "PROCESS_MANAGER";

/// Base name of the configuration file (without extension).
pub const CONFIG_FILE_BASENAME: &str = "process-manager";

/// Default configuration directory, relative to the working directory.
pub const DEFAULT_CONFIG_DIRECTORY: &str = "config";

/// GLN of the DataHub itself; used as the creating actor for system-planned instances.
pub const DATAHUB_ADMINISTRATOR_ACTOR_NUMBER: &str = "5790001330583";

/// Entity names used in errors and log fields.
pub mod entities {
    pub const ORCHESTRATION_DESCRIPTION: &str = "orchestration description";
    pub const ORCHESTRATION_INSTANCE: &str = "orchestration instance";
    pub const STEP_INSTANCE: &str = "step instance";
}
