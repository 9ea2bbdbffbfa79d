//! Database access layer.
//!
//! - `pool`: database-specific pools and the named datasource registry
//! - `datasource`: CRUD intents rendered to parameterized SQL
//! - `render` / `conditions`: statement and WHERE clause assembly
//! - `executor`: statement execution on a pool or an open transaction
//! - `schema`: table metadata from the database catalog
//! - `types`: row decoding

pub mod conditions;
pub mod datasource;
pub mod executor;
pub mod pool;
pub mod render;
pub mod schema;
pub mod types;

pub use conditions::{ConditionParser, RenderedCondition};
pub use datasource::Datasource;
pub use executor::{DbTransaction, QueryExecutor, WriteOutcome};
pub use pool::{ConnectionManager, DbPool};
pub use render::{SqlRenderer, Statement};
pub use schema::{SchemaInspector, SchemaProvider};
