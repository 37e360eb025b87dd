//! Persistence layer for the larder meal-planning service.
//!
//! One process talks to exactly one store: an embedded SQLite file by
//! default, or PostgreSQL when a connection string is configured. The schema
//! is brought up to date by a versioned migration pass before any query runs.

pub mod services;

pub use services::database::{BackendKind, Row, Value};
pub use services::migrations::{Catalog, MigrationReport};
pub use services::{Database, DatabaseConfig, DatabaseError, DatabaseResult, open_and_migrate};
