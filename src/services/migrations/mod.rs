//! Versioned schema migrations.

pub mod catalog;
pub mod runner;
pub mod version;

pub use catalog::{Catalog, Migration, MigrationBody, Statement};
pub use runner::{MigrationReport, MigrationRunner, MigrationState};
pub use version::{
    AppliedMigration, MIGRATIONS_TABLE, PragmaVersionStore, TableVersionStore, VersionStore,
    version_store_for,
};
