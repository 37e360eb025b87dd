//! SQLite connection implementation.
//!
//! This module implements the `DatabaseConnection` trait for the embedded
//! store using SQLx's SqlitePool, capped at a single connection so the file
//! has exactly one writer.

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::types::SqliteValueConverter;
use crate::services::database::error::{DatabaseError, DatabaseResult};
use crate::services::database::traits::{
    BackendKind, BoxedConnection, DatabaseConnection, Row, Value,
};

/// Embedded SQLite connection.
///
/// Every connection the pool hands out runs with write-ahead logging and
/// foreign-key enforcement switched on.
pub struct SqliteConnection {
    path: PathBuf,
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("pool", &"<SqlitePool>")
            .finish()
    }
}

impl SqliteConnection {
    /// Open (creating if missing) the store file at `path`.
    ///
    /// Fails fast if the file or its directory cannot be written.
    pub async fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DatabaseError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let connection_error = |source| DatabaseError::Connection {
            backend: BackendKind::Embedded,
            target: path.display().to_string(),
            source,
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(Self::build_connect_options(path))
            .await
            .map_err(connection_error)?;

        let conn = Self {
            path: path.to_path_buf(),
            pool,
        };
        conn.ping().await.map_err(connection_error)?;

        tracing::debug!(path = %conn.path.display(), "Opened embedded store");
        Ok(conn)
    }

    /// Open and box the connection (for factory use).
    pub async fn boxed(path: &Path) -> DatabaseResult<BoxedConnection> {
        Ok(Box::new(Self::open(path).await?))
    }

    /// Build SqliteConnectOptions for a store file.
    fn build_connect_options(path: &Path) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // Version records must be on disk before the next step starts
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn display_name(&self) -> String {
        self.path.display().to_string()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> sqlx::Result<u64> {
        let query = args
            .iter()
            .fold(sqlx::query(sql), SqliteValueConverter::bind);
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query_rows(&self, sql: &str, args: &[Value]) -> sqlx::Result<Vec<Row>> {
        let query = args
            .iter()
            .fold(sqlx::query(sql), SqliteValueConverter::bind);
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(SqliteValueConverter::convert_row).collect())
    }

    async fn execute_script(&self, sql: &str) -> sqlx::Result<()> {
        sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn add_column_if_absent(
        &self,
        table: &str,
        column: &str,
        definition: &str,
    ) -> sqlx::Result<bool> {
        // SQLite has no ADD COLUMN IF NOT EXISTS.
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")
                .bind(table)
                .bind(column)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_some() {
            tracing::debug!(table, column, "Column already exists");
            return Ok(false);
        }

        let alter = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
        sqlx::query(&alter).execute(&self.pool).await?;
        Ok(true)
    }

    async fn ping(&self) -> sqlx::Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteConnection) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        let conn = smol::block_on(SqliteConnection::open(&path)).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_open_creates_file_and_parent() {
        let (dir, conn) = open_temp();
        assert!(dir.path().join("nested").join("store.db").exists());
        assert_eq!(conn.backend_kind(), BackendKind::Embedded);
        assert!(conn.display_name().ends_with("store.db"));
        smol::block_on(conn.close());
    }

    #[test]
    fn test_session_settings_are_enforced() {
        let (_dir, conn) = open_temp();
        smol::block_on(async {
            let journal = conn.query_rows("PRAGMA journal_mode", &[]).await.unwrap();
            assert_eq!(journal[0].get_str("journal_mode"), Some("wal"));

            let fk = conn.query_rows("PRAGMA foreign_keys", &[]).await.unwrap();
            assert_eq!(fk[0].get_i64("foreign_keys"), Some(1));
            conn.close().await;
        });
    }

    #[test]
    fn test_execute_and_query_with_arguments() {
        let (_dir, conn) = open_temp();
        smol::block_on(async {
            conn.execute_script(
                "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT, weight REAL, raw BLOB)",
            )
            .await
            .unwrap();

            let affected = conn
                .execute(
                    "INSERT INTO notes (body, weight, raw) VALUES (?, ?, ?)",
                    &[
                        Value::from("stock"),
                        Value::from(1.5),
                        Value::Bytes(vec![1, 2]),
                    ],
                )
                .await
                .unwrap();
            assert_eq!(affected, 1);

            let rows = conn
                .query_rows(
                    "SELECT id, body, weight, raw FROM notes WHERE body = ?",
                    &[Value::from("stock")],
                )
                .await
                .unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].get_i64("id"), Some(1));
            assert_eq!(rows[0].get_str("body"), Some("stock"));
            assert_eq!(rows[0].get("weight"), Some(&Value::Float64(1.5)));
            assert_eq!(rows[0].get("raw"), Some(&Value::Bytes(vec![1, 2])));

            let none = conn
                .query_rows("SELECT id FROM notes WHERE body = ?", &[Value::from("x")])
                .await
                .unwrap();
            assert!(none.is_empty());
            conn.close().await;
        });
    }

    #[test]
    fn test_null_argument_round_trip() {
        let (_dir, conn) = open_temp();
        smol::block_on(async {
            conn.execute_script("CREATE TABLE t (id INTEGER PRIMARY KEY, note TEXT)")
                .await
                .unwrap();
            conn.execute("INSERT INTO t (note) VALUES (?)", &[Value::Null])
                .await
                .unwrap();
            let rows = conn.query_rows("SELECT note FROM t", &[]).await.unwrap();
            assert_eq!(rows[0].get("note"), Some(&Value::Null));
            conn.close().await;
        });
    }

    #[test]
    fn test_foreign_key_cascade() {
        let (_dir, conn) = open_temp();
        smol::block_on(async {
            conn.execute_script(
                "CREATE TABLE parent (id INTEGER PRIMARY KEY);
                 CREATE TABLE child (
                     id INTEGER PRIMARY KEY,
                     parent_id INTEGER REFERENCES parent(id) ON DELETE CASCADE
                 );
                 INSERT INTO parent (id) VALUES (1);
                 INSERT INTO child (parent_id) VALUES (1);",
            )
            .await
            .unwrap();

            conn.execute("DELETE FROM parent WHERE id = ?", &[Value::from(1i64)])
                .await
                .unwrap();
            let rows = conn.query_rows("SELECT * FROM child", &[]).await.unwrap();
            assert!(rows.is_empty());
            conn.close().await;
        });
    }

    #[test]
    fn test_add_column_if_absent_is_idempotent() {
        let (_dir, conn) = open_temp();
        smol::block_on(async {
            conn.execute_script("CREATE TABLE recipes (id INTEGER PRIMARY KEY)")
                .await
                .unwrap();
            assert!(
                conn.add_column_if_absent("recipes", "source_url", "TEXT")
                    .await
                    .unwrap()
            );
            assert!(
                !conn
                    .add_column_if_absent("recipes", "source_url", "TEXT")
                    .await
                    .unwrap()
            );
            conn.close().await;
        });
    }

    #[test]
    fn test_unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file cannot be used as a directory.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let path = blocker.join("store.db");

        let err = smol::block_on(SqliteConnection::open(&path)).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, DatabaseError::CreateDirectory { .. }));
    }
}
