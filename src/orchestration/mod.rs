//! # Orchestration Instances
//!
//! Everything that creates orchestration instances or moves them forward.
//!
//! ## Core Components
//!
//! - **OrchestrationInstanceRepository**: persistence gateway for instances, reads plus staged writes
//! - **OrchestrationInstanceManager**: start, schedule and cancel instances with idempotency
//! - **ProgressRepository**: replay-safe instance and step transitions for workflow activities
//! - **ExecutionEngineClient**: boundary to the engine that runs queued instances
//! - **ScheduledInstanceDispatcher**: queues scheduled instances once they are due
//! - **RecurringInstancePlanner**: schedules instances from recurring cron expressions

pub mod execution;
pub mod instance_manager;
pub mod instance_repository;
pub mod progress_repository;
pub mod recurring_planner;
pub mod scheduler;

pub use execution::{ExecutionEngineClient, InMemoryExecutionEngine, StartedExecution};
pub use instance_manager::{OrchestrationInstanceManager, StartOrchestrationInstanceRequest};
pub use instance_repository::OrchestrationInstanceRepository;
pub use progress_repository::ProgressRepository;
pub use recurring_planner::{PlanningSummary, RecurringInstancePlanner};
pub use scheduler::{DispatchSummary, ScheduledInstanceDispatcher};
