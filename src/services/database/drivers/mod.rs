//! Backend driver implementations.
//!
//! This module contains the two backend handles:
//!
//! - **SQLite**: embedded, single-file store via SQLx
//! - **PostgreSQL**: networked store behind a bounded SQLx pool
//!
//! Each driver implements the `DatabaseConnection` trait. `ConnectionFactory`
//! picks one from the process configuration.

mod factory;

pub mod postgres;
pub mod sqlite;

pub use factory::ConnectionFactory;
