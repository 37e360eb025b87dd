//! Process startup for the persistence layer.
//!
//! Opens exactly one backend, migrates it to the catalog's latest version
//! and hands back the query façade. Any error here means the process must
//! not serve requests.

use super::database::Database;
use super::database::drivers::ConnectionFactory;
use super::database::error::DatabaseResult;
use super::database::traits::DatabaseConfig;
use super::migrations::{Catalog, MigrationReport, MigrationRunner};

/// Open the configured store and bring its schema up to date.
///
/// The connection is closed again if migration fails.
pub async fn open_and_migrate(
    config: &DatabaseConfig,
    catalog: &Catalog,
) -> DatabaseResult<(Database, MigrationReport)> {
    let connection = ConnectionFactory::open(config).await?;

    let result = MigrationRunner::new(connection.as_ref(), catalog).run().await;
    match result {
        Ok(report) => Ok((Database::new(connection), report)),
        Err(e) => {
            connection.close().await;
            Err(e)
        }
    }
}

/// Open the configured store without migrating it.
///
/// Used by read-only commands that inspect the recorded version.
pub async fn open(config: &DatabaseConfig) -> DatabaseResult<Database> {
    Ok(Database::new(ConnectionFactory::open(config).await?))
}
