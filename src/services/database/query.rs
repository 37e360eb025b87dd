//! Query façade handed to the rest of the application.
//!
//! Callers write SQL with `?` placeholders and never learn which backend is
//! active. Every failure comes back as `DatabaseError::Query` carrying the
//! backend and the SQL as sent.

use std::sync::Arc;

use super::dialect::Dialect;
use super::error::{DatabaseError, DatabaseResult};
use super::traits::{BackendKind, BoxedConnection, DatabaseConnection, Row, Value};
use crate::services::migrations::version_store_for;

/// Backend-agnostic handle for application queries.
///
/// Cheap to clone; all clones share the same pool.
#[derive(Clone)]
pub struct Database {
    connection: Arc<dyn DatabaseConnection>,
    dialect: Dialect,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.connection.backend_kind())
            .field("store", &self.connection.display_name())
            .finish()
    }
}

impl Database {
    /// Wrap an open connection.
    pub fn new(connection: BoxedConnection) -> Self {
        let dialect = Dialect::for_backend(connection.backend_kind());
        Self {
            connection: Arc::from(connection),
            dialect,
        }
    }

    /// Which backend is active
    pub fn backend_kind(&self) -> BackendKind {
        self.connection.backend_kind()
    }

    /// The underlying connection, for the migration runner and version reads.
    pub fn connection(&self) -> &dyn DatabaseConnection {
        self.connection.as_ref()
    }

    /// Run a statement that returns no rows. Returns the affected row count.
    pub async fn execute(&self, sql: &str, args: &[Value]) -> DatabaseResult<u64> {
        let sql = self.dialect.translate(sql);
        tracing::trace!(backend = %self.backend_kind(), sql = %sql, "execute");

        self.connection
            .execute(&sql, args)
            .await
            .map_err(|source| self.query_error(&sql, source))
    }

    /// Run a query and return every row, in the order the backend produced them.
    ///
    /// A query matching nothing returns an empty vector.
    pub async fn query_rows(&self, sql: &str, args: &[Value]) -> DatabaseResult<Vec<Row>> {
        let sql = self.dialect.translate(sql);
        tracing::trace!(backend = %self.backend_kind(), sql = %sql, "query");

        self.connection
            .query_rows(&sql, args)
            .await
            .map_err(|source| self.query_error(&sql, source))
    }

    /// Run a query expected to match at most one row.
    pub async fn query_optional(&self, sql: &str, args: &[Value]) -> DatabaseResult<Option<Row>> {
        Ok(self.query_rows(sql, args).await?.into_iter().next())
    }

    /// The store's recorded schema version.
    pub async fn version(&self) -> DatabaseResult<i64> {
        version_store_for(self.backend_kind())
            .current_version(self.connection())
            .await
    }

    /// Verify the store still answers.
    pub async fn ping(&self) -> DatabaseResult<()> {
        self.connection
            .ping()
            .await
            .map_err(|source| self.query_error("SELECT 1", source))
    }

    /// Release the pool. Clones become unusable afterwards.
    pub async fn close(&self) {
        tracing::debug!(backend = %self.backend_kind(), "Closing store");
        self.connection.close().await;
    }

    fn query_error(&self, sql: &str, source: sqlx::Error) -> DatabaseError {
        DatabaseError::Query {
            backend: self.backend_kind(),
            sql: sql.to_string(),
            source,
        }
    }
}
