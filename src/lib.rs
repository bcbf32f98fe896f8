#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Process Manager Core
//!
//! Registration and lifecycle core for a process manager that runs versioned
//! business orchestrations for an energy-market data hub.
//!
//! ## Overview
//!
//! Hosts declare the orchestrations they can run at startup. The register keeps
//! those declarations persisted and refuses redefinitions that would change how
//! already-recorded history is read. Each request to run an orchestration becomes
//! an orchestration instance whose lifecycle and steps only move forward, with
//! idempotency keys and optimistic concurrency keeping concurrent callers safe.
//!
//! ## Module Organization
//!
//! - [`models`] - Orchestration descriptions, instances and their value objects
//! - [`state_machine`] - Pure lifecycle transition tables for instances and steps
//! - [`registry`] - Orchestration register and breaking-change detection
//! - [`database`] - Store contract, unit of work, in-memory and PostgreSQL stores
//! - [`orchestration`] - Instance creation, scheduling, progress and dispatch
//! - [`config`] - Environment-aware configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use process_manager::clock::SystemClock;
//! use process_manager::config::RegisterConfig;
//! use process_manager::database::{InMemoryStore, ProcessManagerStore};
//! use process_manager::models::{
//!     Actor, ActorNumber, ActorRole, OperatingIdentity, OrchestrationDescription,
//!     OrchestrationDescriptionUniqueName, ParameterValue,
//! };
//! use process_manager::orchestration::{
//!     InMemoryExecutionEngine, OrchestrationInstanceManager, StartOrchestrationInstanceRequest,
//! };
//! use process_manager::registry::OrchestrationRegister;
//! use std::sync::Arc;
//!
//! # async fn example() -> process_manager::Result<()> {
//! let store: Arc<dyn ProcessManagerStore> = Arc::new(InMemoryStore::new());
//!
//! let unique_name = OrchestrationDescriptionUniqueName::new("BRS_021_ForwardMeteredData", 1)?;
//! let mut description = OrchestrationDescription::new(
//!     unique_name.clone(),
//!     false,
//!     "Orchestration_Brs_021_ForwardMeteredData_V1",
//! );
//! description.append_step_description("Validate metered data", false, "")?;
//!
//! OrchestrationRegister::new(store.clone(), RegisterConfig::default())
//!     .register_or_update(&description, "host-a")
//!     .await?;
//!
//! let manager = OrchestrationInstanceManager::new(
//!     store,
//!     Arc::new(InMemoryExecutionEngine::new()),
//!     Arc::new(SystemClock),
//! );
//! let created_by = OperatingIdentity::actor(Actor::new(
//!     ActorNumber::new("5790001330583")?,
//!     ActorRole::GridAccessProvider,
//! ));
//! let id = manager
//!     .start_new_orchestration_instance(StartOrchestrationInstanceRequest::new(
//!         unique_name,
//!         created_by,
//!         ParameterValue::empty(),
//!     ))
//!     .await?;
//! println!("Started orchestration instance {id}");
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod validation;

pub use config::{ConfigManager, ProcessManagerConfig};
pub use error::{ProcessManagerError, Result};
