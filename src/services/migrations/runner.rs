//! Migration runner.
//!
//! Reads the current version, then for every catalog step with a higher id,
//! in ascending id order, runs the step's body and records its id. The
//! first error stops the pass; nothing is retried. A step whose body ran but
//! whose version was not recorded is replayed from the start on the next
//! boot, which is why every body must be idempotent.

use crate::services::database::error::{DatabaseError, DatabaseResult};
use crate::services::database::traits::{BackendKind, DatabaseConnection};

use super::catalog::{Catalog, Migration};
use super::version::{VersionStore, version_store_for};

/// Where the runner is in a migration pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Idle,
    ReadingVersion,
    Applying(i64),
    Recording(i64),
    Done,
    Failed,
}

/// Outcome of a successful migration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub backend: BackendKind,
    /// Version recorded before the pass started
    pub from_version: i64,
    /// Version recorded when the pass finished
    pub to_version: i64,
    /// Ids of the steps applied during this pass, in order
    pub applied: Vec<i64>,
}

impl MigrationReport {
    /// Whether the pass changed anything
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies pending catalog steps to one store.
///
/// The runner is the only writer of the version store for the duration of a
/// pass. Running two passes against the same store concurrently is not
/// supported.
pub struct MigrationRunner<'a> {
    conn: &'a dyn DatabaseConnection,
    catalog: &'a Catalog,
    versions: Box<dyn VersionStore>,
    state: MigrationState,
}

impl<'a> MigrationRunner<'a> {
    /// Create a runner using the version store native to the connection's backend.
    pub fn new(conn: &'a dyn DatabaseConnection, catalog: &'a Catalog) -> Self {
        Self::with_version_store(conn, catalog, version_store_for(conn.backend_kind()))
    }

    /// Create a runner with an explicit version store.
    pub fn with_version_store(
        conn: &'a dyn DatabaseConnection,
        catalog: &'a Catalog,
        versions: Box<dyn VersionStore>,
    ) -> Self {
        Self {
            conn,
            catalog,
            versions,
            state: MigrationState::Idle,
        }
    }

    /// Current position in the state machine
    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// Ids of the steps a pass would apply, without applying anything.
    pub async fn plan(&self) -> DatabaseResult<Vec<i64>> {
        let current = self.versions.current_version(self.conn).await?;
        Ok(self.catalog.pending(current).map(|step| step.id).collect())
    }

    /// Run a full migration pass.
    ///
    /// # Errors
    ///
    /// - `VersionSetup` if the version store cannot be prepared
    /// - `VersionRead` if the recorded version cannot be read
    /// - `MigrationStep` if a body fails; the version stays at the previous step
    /// - `Persistence` if a body succeeded but its version could not be recorded
    ///
    /// All of them are fatal: the caller should stop the process.
    pub async fn run(&mut self) -> DatabaseResult<MigrationReport> {
        let backend = self.conn.backend_kind();
        self.transition(MigrationState::ReadingVersion);

        let from_version = match self.read_version().await {
            Ok(version) => version,
            Err(e) => {
                self.transition(MigrationState::Failed);
                return Err(e);
            }
        };

        let latest = self.catalog.latest_version();
        if from_version > latest {
            tracing::warn!(
                backend = %backend,
                recorded = from_version,
                latest,
                "Store is ahead of this build's migration catalog; leaving it untouched"
            );
        }

        let catalog = self.catalog;
        let mut report = MigrationReport {
            backend,
            from_version,
            to_version: from_version,
            applied: Vec::new(),
        };

        for step in catalog.pending(from_version) {
            if let Err(e) = self.apply_and_record(step).await {
                self.transition(MigrationState::Failed);
                tracing::error!(
                    backend = %backend,
                    step = step.id,
                    error = %e,
                    "Migration failed"
                );
                return Err(e);
            }
            report.to_version = step.id;
            report.applied.push(step.id);
        }

        self.transition(MigrationState::Done);
        if report.is_noop() {
            tracing::info!(backend = %backend, version = from_version, "Schema is up to date");
        } else {
            tracing::info!(
                backend = %backend,
                from = report.from_version,
                to = report.to_version,
                applied = report.applied.len(),
                "Migrations applied"
            );
        }
        Ok(report)
    }

    async fn read_version(&self) -> DatabaseResult<i64> {
        self.versions.prepare(self.conn).await?;
        self.versions.current_version(self.conn).await
    }

    async fn apply_and_record(&mut self, step: &Migration) -> DatabaseResult<()> {
        let backend = self.conn.backend_kind();

        self.transition(MigrationState::Applying(step.id));
        tracing::info!(
            backend = %backend,
            step = step.id,
            migration = step.name,
            "Applying migration"
        );
        step.apply_body(self.conn)
            .await
            .map_err(|source| DatabaseError::MigrationStep {
                id: step.id,
                backend,
                source,
            })?;

        self.transition(MigrationState::Recording(step.id));
        self.versions.record_version(self.conn, step.id).await
    }

    fn transition(&mut self, next: MigrationState) {
        tracing::debug!(from = ?self.state, to = ?next, "Migration state");
        self.state = next;
    }
}
