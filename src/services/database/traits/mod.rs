//! Backend abstraction traits and types.
//!
//! This module provides the uniform surface the two drivers implement:
//!
//! - **Types** (`types`): Backend kind, process configuration, TLS mode
//! - **Row/Value** (`row`): Backend-agnostic value representation
//! - **Connection** (`connection`): Core connection trait
//!
//! # Example
//!
//! ```ignore
//! use larder::services::database::traits::{BackendKind, DatabaseConfig};
//!
//! let config = DatabaseConfig::from_env();
//! assert_eq!(config.backend_kind(), BackendKind::Embedded);
//! ```

pub mod connection;
pub mod row;
pub mod types;

pub use connection::{BoxedConnection, DatabaseConnection};

pub use row::{Row, Value};

pub use types::{BackendKind, DatabaseConfig, TlsMode};
