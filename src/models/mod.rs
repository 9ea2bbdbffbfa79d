//! Data models shared by the datasource and entity layers.

pub mod condition;
pub mod connection;
pub mod query;
pub mod record;
pub mod schema;

pub use condition::{Condition, Operator};
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{Fields, Join, QueryParam, QueryParams};
pub use record::Record;
pub use schema::{ColumnDefinition, TableSchema};
