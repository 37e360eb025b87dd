//! Persistence of the schema version.
//!
//! The version is the id of the highest migration step whose body ran to
//! completion. Both backends report 0 for a store that has never been
//! migrated.
//!
//! - Embedded: SQLite's `user_version` header counter, scoped to the file.
//! - Networked: `MAX(version)` over the append-only `schema_migrations` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::services::database::error::{DatabaseError, DatabaseResult};
use crate::services::database::traits::{BackendKind, DatabaseConnection, Value};

/// Name of the networked backend's migrations log.
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

/// Reads and records the schema version of a store.
///
/// Only the migration runner calls `record_version`.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Create whatever the store needs before a version can be read.
    ///
    /// Idempotent. Runs first in every migration pass.
    async fn prepare(&self, conn: &dyn DatabaseConnection) -> DatabaseResult<()>;

    /// The recorded version, or 0 for a never-migrated store.
    async fn current_version(&self, conn: &dyn DatabaseConnection) -> DatabaseResult<i64>;

    /// Durably record `id` as the highest applied step.
    async fn record_version(&self, conn: &dyn DatabaseConnection, id: i64) -> DatabaseResult<()>;
}

/// Pick the version store matching a backend kind.
pub fn version_store_for(kind: BackendKind) -> Box<dyn VersionStore> {
    match kind {
        BackendKind::Embedded => Box::new(PragmaVersionStore),
        BackendKind::Networked => Box::new(TableVersionStore),
    }
}

/// Embedded store: the file's `PRAGMA user_version` counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PragmaVersionStore;

#[async_trait]
impl VersionStore for PragmaVersionStore {
    async fn prepare(&self, _conn: &dyn DatabaseConnection) -> DatabaseResult<()> {
        // The counter lives in the file header and always exists.
        Ok(())
    }

    async fn current_version(&self, conn: &dyn DatabaseConnection) -> DatabaseResult<i64> {
        let rows = conn
            .query_rows("PRAGMA user_version", &[])
            .await
            .map_err(|source| DatabaseError::VersionRead {
                backend: BackendKind::Embedded,
                source,
            })?;

        Ok(rows
            .first()
            .and_then(|row| row.get_i64("user_version"))
            .unwrap_or(0))
    }

    async fn record_version(&self, conn: &dyn DatabaseConnection, id: i64) -> DatabaseResult<()> {
        // PRAGMA values cannot be bound; ids are validated integers.
        conn.execute_script(&format!("PRAGMA user_version = {id}"))
            .await
            .map_err(|source| DatabaseError::Persistence {
                id,
                backend: BackendKind::Embedded,
                source,
            })
    }
}

/// One row of the networked migrations log.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    pub version: i64,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Networked store: the append-only `schema_migrations` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableVersionStore;

impl TableVersionStore {
    fn read_error(source: sqlx::Error) -> DatabaseError {
        DatabaseError::VersionRead {
            backend: BackendKind::Networked,
            source,
        }
    }

    /// Whether the migrations log has been created yet.
    async fn table_exists(&self, conn: &dyn DatabaseConnection) -> DatabaseResult<bool> {
        let rows = conn
            .query_rows(
                "SELECT COUNT(*) AS present FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1",
                &[Value::from(MIGRATIONS_TABLE)],
            )
            .await
            .map_err(Self::read_error)?;

        Ok(rows
            .first()
            .and_then(|row| row.get_i64("present"))
            .unwrap_or(0)
            > 0)
    }

    /// Every recorded version with its timestamp, oldest first.
    pub async fn applied(
        &self,
        conn: &dyn DatabaseConnection,
    ) -> DatabaseResult<Vec<AppliedMigration>> {
        if !self.table_exists(conn).await? {
            return Ok(Vec::new());
        }

        let rows = conn
            .query_rows(
                "SELECT version, applied_at FROM schema_migrations ORDER BY version",
                &[],
            )
            .await
            .map_err(Self::read_error)?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let version = row.get_i64("version")?;
                let applied_at = match row.get("applied_at") {
                    Some(Value::DateTimeTz(at)) => Some(*at),
                    _ => None,
                };
                Some(AppliedMigration {
                    version,
                    applied_at,
                })
            })
            .collect())
    }
}

#[async_trait]
impl VersionStore for TableVersionStore {
    async fn prepare(&self, conn: &dyn DatabaseConnection) -> DatabaseResult<()> {
        conn.execute_script(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .await
        .map_err(|source| DatabaseError::VersionSetup {
            backend: BackendKind::Networked,
            source,
        })
    }

    async fn current_version(&self, conn: &dyn DatabaseConnection) -> DatabaseResult<i64> {
        // Read-only callers (status, health checks) may arrive before any migration pass.
        if !self.table_exists(conn).await? {
            return Ok(0);
        }

        let rows = conn
            .query_rows(
                "SELECT COALESCE(MAX(version), 0) AS version FROM schema_migrations",
                &[],
            )
            .await
            .map_err(Self::read_error)?;

        Ok(rows
            .first()
            .and_then(|row| row.get_i64("version"))
            .unwrap_or(0))
    }

    async fn record_version(&self, conn: &dyn DatabaseConnection, id: i64) -> DatabaseResult<()> {
        let persistence_error = |source| DatabaseError::Persistence {
            id,
            backend: BackendKind::Networked,
            source,
        };

        let version = i32::try_from(id)
            .map_err(|e| persistence_error(sqlx::Error::Encode(Box::new(e))))?;

        conn.execute(
            "INSERT INTO schema_migrations (version) VALUES ($1)",
            &[Value::Int32(version)],
        )
        .await
        .map(|_| ())
        .map_err(persistence_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::drivers::sqlite::SqliteConnection;

    #[test]
    fn test_pragma_store_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        smol::block_on(async {
            let conn = SqliteConnection::open(&dir.path().join("v.db")).await.unwrap();
            let store = PragmaVersionStore;
            store.prepare(&conn).await.unwrap();
            assert_eq!(store.current_version(&conn).await.unwrap(), 0);
            conn.close().await;
        });
    }

    #[test]
    fn test_table_store_prepare_failure_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        smol::block_on(async {
            let conn = SqliteConnection::open(&dir.path().join("v.db")).await.unwrap();
            conn.close().await;

            let err = TableVersionStore.prepare(&conn).await.unwrap_err();
            assert!(matches!(
                err,
                DatabaseError::VersionSetup {
                    backend: BackendKind::Networked,
                    ..
                }
            ));
        });
    }

    #[test]
    fn test_pragma_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.db");
        smol::block_on(async {
            let conn = SqliteConnection::open(&path).await.unwrap();
            PragmaVersionStore.record_version(&conn, 7).await.unwrap();
            conn.close().await;

            let conn = SqliteConnection::open(&path).await.unwrap();
            assert_eq!(PragmaVersionStore.current_version(&conn).await.unwrap(), 7);
            conn.close().await;
        });
    }
}
