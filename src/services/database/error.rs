//! Error taxonomy for the persistence layer.
//!
//! Everything raised while opening a store or migrating it is fatal to the
//! process. `Query` errors come from the façade during normal operation and
//! are handed back to the caller.

use std::path::PathBuf;

use thiserror::Error;

use super::traits::BackendKind;

/// Errors from opening, migrating or querying a store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("could not open {backend} store at {target}: {source}")]
    Connection {
        backend: BackendKind,
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("could not create directory {} for the embedded store: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid migration catalog: {0}")]
    InvalidCatalog(String),

    #[error("could not create the migrations log on {backend} store: {source}")]
    VersionSetup {
        backend: BackendKind,
        #[source]
        source: sqlx::Error,
    },

    #[error("could not read schema version from {backend} store: {source}")]
    VersionRead {
        backend: BackendKind,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration {id} failed on {backend} backend: {source}")]
    MigrationStep {
        id: i64,
        backend: BackendKind,
        #[source]
        source: sqlx::Error,
    },

    #[error(
        "migration {id} applied on {backend} backend but its version could not be recorded: {source}"
    )]
    Persistence {
        id: i64,
        backend: BackendKind,
        #[source]
        source: sqlx::Error,
    },

    #[error("query failed on {backend} backend: {source} (sql: {sql})")]
    Query {
        backend: BackendKind,
        sql: String,
        #[source]
        source: sqlx::Error,
    },
}

impl DatabaseError {
    /// The migration step this error is attributed to, if any
    pub fn step_id(&self) -> Option<i64> {
        match self {
            Self::MigrationStep { id, .. } | Self::Persistence { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Whether this error belongs to the startup phase (open or migrate)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Query { .. })
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
