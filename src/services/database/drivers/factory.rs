//! Connection factory for opening the configured backend.
//!
//! The factory is the single place where the backend choice turns into a
//! concrete handle. Everything above it works with `BoxedConnection`.

use super::postgres::PostgresConnection;
use super::sqlite::SqliteConnection;
use crate::services::database::error::DatabaseResult;
use crate::services::database::traits::{BackendKind, BoxedConnection, DatabaseConfig};

/// Factory for opening backend handles based on configuration.
///
/// # Example
///
/// ```ignore
/// use larder::services::database::drivers::ConnectionFactory;
/// use larder::services::database::traits::DatabaseConfig;
///
/// let config = DatabaseConfig::embedded("data/larder.db");
/// let connection = ConnectionFactory::open(&config).await?;
/// ```
pub struct ConnectionFactory;

impl ConnectionFactory {
    /// Open exactly one backend handle for the configuration.
    ///
    /// A connection string selects the networked store; without one the
    /// embedded store file is opened (and created if missing).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Connection` (or `CreateDirectory`) if the
    /// store cannot be reached or written. Callers treat this as fatal.
    pub async fn open(config: &DatabaseConfig) -> DatabaseResult<BoxedConnection> {
        let kind = config.backend_kind();
        tracing::info!(
            backend = %kind,
            store = %config.display_target(),
            "Opening {}",
            kind.display_name()
        );

        match (kind, config.database_url.as_deref()) {
            (BackendKind::Networked, Some(url)) => {
                PostgresConnection::boxed(url, config.tls_mode()).await
            }
            _ => SqliteConnection::boxed(config.sqlite_path()).await,
        }
    }
}
