//! # Persistence
//!
//! Store contract, unit of work and the two store backends.
//!
//! ## Key Components
//!
//! - [`ProcessManagerStore`] - async store contract for both aggregates
//! - [`UnitOfWork`] - explicit transaction boundary around staged writes
//! - [`OrchestrationInstanceSearch`] / [`ActorActivitySearch`] - search criteria
//! - [`InMemoryStore`] - lock-guarded maps for tests and embedded use
//! - [`PgStore`] - PostgreSQL backend, with [`DatabaseMigrations`] for its schema
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use process_manager::database::{InMemoryStore, ProcessManagerStore, UnitOfWork};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn ProcessManagerStore> = Arc::new(InMemoryStore::new());
//! let unit_of_work = UnitOfWork::new(store);
//! assert!(!unit_of_work.has_changes());
//! ```

pub mod in_memory;
pub mod search;
pub mod store;
pub mod unit_of_work;

#[cfg(feature = "postgres")]
pub mod connection;
#[cfg(feature = "postgres")]
pub mod migrations;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use search::{ActorActivitySearch, OrchestrationInstanceSearch};
pub use store::ProcessManagerStore;
pub use unit_of_work::{ChangeSet, StagedChange, UnitOfWork};

#[cfg(feature = "postgres")]
pub use connection::DatabaseConnection;
#[cfg(feature = "postgres")]
pub use migrations::{DatabaseMigrations, Migration};
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
