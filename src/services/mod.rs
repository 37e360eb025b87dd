pub mod bootstrap;
pub mod database;
pub mod migrations;

pub use bootstrap::open_and_migrate;
pub use database::{Database, DatabaseConfig, DatabaseError, DatabaseResult};
