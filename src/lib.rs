//! # docdb
//!
//! Minimal document store over PostgreSQL JSONB columns, built on
//! `may_postgres` for the `may` coroutine runtime.
//!
//! Documents are plain `serde` types. Each type is described by a
//! [`DocumentMeta`] (table, JSONB column, id field, extra columns) registered in
//! a [`MetaRegistry`]; [`DocumentStore`] turns [`Criteria`] into parameterized
//! SQL, binds values in placeholder order, and (de)serializes the JSON bodies.

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod meta;
pub mod metrics;
pub mod pool;
pub mod query;
pub mod repository;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::{DatabaseConfig, DocumentMetaConfig, DocumentsConfig};
pub use connection::{connect, ConnectionError};
pub use error::{DocError, PersistenceError, TypeMappingError};
pub use executor::{DocExecutor, MayPostgresExecutor};
pub use meta::{ColumnExtra, DocumentMeta, MetaError, MetaRegistry};
pub use pool::{ConnectionProvider, DbPool, PooledConnection};
pub use query::{Criteria, Criterion, Jsonb, Order, OrderBy, SqlBuilder, SqlParam, SqlType, Value};
pub use repository::{Document, DocumentStore};
