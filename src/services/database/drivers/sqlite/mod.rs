//! SQLite (embedded) driver implementation.
//!
//! This module provides the embedded backend handle, implementing
//! `DatabaseConnection` using SQLx.
//!
//! The store is a single file on local disk. Every connection runs with:
//! - Write-ahead logging (`journal_mode = WAL`)
//! - Foreign-key enforcement (`foreign_keys = ON`)
//!
//! # Example
//!
//! ```ignore
//! use larder::services::database::drivers::sqlite::SqliteConnection;
//! use std::path::Path;
//!
//! let conn = SqliteConnection::open(Path::new("data/larder.db")).await?;
//! ```

mod connection;
mod types;

pub use connection::SqliteConnection;
