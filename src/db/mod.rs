//! Database layer
//!
//! Storage abstraction for the AstroCall backend. Supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The driver is selected from configuration. Repositories under
//! `repositories/` expose trait-based data access; the guarded status
//! updates in the session repository are the concurrency boundary for the
//! call lifecycle state machine.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool};
