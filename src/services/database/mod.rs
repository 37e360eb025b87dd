mod query;

pub mod dialect;
pub mod drivers;
pub mod error;
pub mod traits;

pub use dialect::Dialect;
pub use drivers::ConnectionFactory;
pub use error::{DatabaseError, DatabaseResult};
pub use query::Database;
pub use traits::{
    BackendKind, BoxedConnection, DatabaseConfig, DatabaseConnection, Row, TlsMode, Value,
};
