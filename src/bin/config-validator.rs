//! # Process Manager Configuration Validator
//!
//! Command-line tool for validating process manager configuration across
//! environments before a host is deployed.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use process_manager::config::{ConfigManager, ProcessManagerConfig};
use process_manager::constants::CONFIG_FILE_BASENAME;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate process manager configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, env = "PROCESS_MANAGER_ENV", default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration (default)
    Validate,

    /// Print the merged configuration with secrets masked
    Show,

    /// List environments that have an override file
    Environments,

    /// Validate, then open a database connection and run a health check
    #[cfg(feature = "postgres")]
    CheckDatabase,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Validate) | None => validate(&cli).map(|_| ()),
        Some(Commands::Show) => show(&cli),
        Some(Commands::Environments) => list_environments(&cli),
        #[cfg(feature = "postgres")]
        Some(Commands::CheckDatabase) => check_database(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn validate(cli: &Cli) -> anyhow::Result<ProcessManagerConfig> {
    println!("🔧 Validating Process Manager Configuration");
    println!("Environment: {}", cli.environment);
    if let Some(config_dir) = &cli.config_dir {
        println!("Config Directory: {}", config_dir.display());
    }
    println!();

    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))?;
    let config = manager.config().clone();

    println!("✅ Configuration loaded and validated");
    println!(
        "   🗄️  Database pool: {} connections, {}s acquire timeout",
        config.database.max_connections, config.database.acquire_timeout_seconds
    );
    println!(
        "   📋 Breaking changes allowed: {}",
        config.register.allow_orchestration_description_breaking_changes
    );
    println!(
        "   ⏱️  Scheduler: poll every {}s, plan {}h ahead",
        config.scheduler.poll_interval_seconds, config.scheduler.recurring_planning_window_hours
    );

    if config.register.allow_orchestration_description_breaking_changes
        && manager.environment() == "production"
    {
        bail!("breaking changes to orchestration descriptions must not be allowed in production");
    }

    Ok(config)
}

fn show(cli: &Cli) -> anyhow::Result<()> {
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))?;
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(())
}

fn list_environments(cli: &Cli) -> anyhow::Result<()> {
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(process_manager::constants::DEFAULT_CONFIG_DIRECTORY));
    println!("📋 Available Environments in {}:", config_dir.display());

    for environment in discover_environments(&config_dir)? {
        println!("  • {environment}");
    }
    Ok(())
}

/// Environment names taken from `process-manager.{environment}.yaml` files.
fn discover_environments(config_dir: &Path) -> anyhow::Result<Vec<String>> {
    let prefix = format!("{CONFIG_FILE_BASENAME}.");
    let mut environments = Vec::new();

    for entry in std::fs::read_dir(config_dir)
        .with_context(|| format!("reading {}", config_dir.display()))?
    {
        let file_name = entry?.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(environment) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".yaml"))
        {
            environments.push(environment.to_string());
        }
    }

    environments.sort();
    Ok(environments)
}

#[cfg(feature = "postgres")]
fn check_database(cli: &Cli) -> anyhow::Result<()> {
    use process_manager::database::DatabaseConnection;

    let config = validate(cli)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let connection = DatabaseConnection::connect(&config.database)
            .await
            .context("connecting to the database")?;
        let healthy = connection.health_check().await?;
        connection.close().await;
        if !healthy {
            bail!("database health check failed");
        }
        println!("   ✅ Database reachable");
        Ok::<(), anyhow::Error>(())
    })
}
