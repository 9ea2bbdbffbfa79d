//! modelgate
//!
//! A value validation engine plus a query-building data access layer for
//! SQL-backed models (SQLite, PostgreSQL, MySQL).

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod models;
pub mod validation;

pub use config::Config;
pub use db::{ConnectionManager, Datasource};
pub use entity::{EntityManager, Model};
pub use error::{DbError, RuleError};
pub use validation::{Rule, Validator};
