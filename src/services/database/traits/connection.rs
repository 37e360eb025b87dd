//! Core backend connection trait.
//!
//! This module defines the `DatabaseConnection` trait that both drivers implement.
//! Queries arriving here are already in the backend's native placeholder syntax;
//! translation happens one layer up in the query façade.

use async_trait::async_trait;

use super::row::{Row, Value};
use super::types::BackendKind;

/// Core trait for the two backend handles.
///
/// Errors are raw driver errors. Callers wrap them into the taxonomy in
/// `services::database::error` with whatever context they have (step id,
/// SQL text).
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Which backend this handle talks to
    fn backend_kind(&self) -> BackendKind;

    /// Human-readable target for logs. Never includes credentials.
    fn display_name(&self) -> String;

    /// Execute a single statement with positional arguments.
    ///
    /// Returns the number of affected rows.
    async fn execute(&self, sql: &str, args: &[Value]) -> sqlx::Result<u64>;

    /// Run a single statement with positional arguments and collect every row.
    ///
    /// Always returns a (possibly empty) vector in backend result order.
    async fn query_rows(&self, sql: &str, args: &[Value]) -> sqlx::Result<Vec<Row>>;

    /// Execute a script that may contain several `;`-separated statements.
    ///
    /// No arguments are bound. Used for migration bodies.
    async fn execute_script(&self, sql: &str) -> sqlx::Result<()>;

    /// Add a column unless the table already has one with that name.
    ///
    /// Returns `true` when the column was created by this call.
    async fn add_column_if_absent(
        &self,
        table: &str,
        column: &str,
        definition: &str,
    ) -> sqlx::Result<bool>;

    /// Run a trivial round-trip to prove the store is reachable.
    async fn ping(&self) -> sqlx::Result<()>;

    /// Release the underlying file handle or pool.
    async fn close(&self);
}

/// A boxed database connection trait object.
pub type BoxedConnection = Box<dyn DatabaseConnection>;
