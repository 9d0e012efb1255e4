//! Statement execution over `may_postgres`.
//!
//! Provides the [`DocExecutor`] trait the document store runs statements
//! through, and [`MayPostgresExecutor`], its implementation over a
//! `may_postgres::Client`. Statements arrive with `?` placeholders and are
//! renumbered to PostgreSQL's `$1..$n` form just before they are sent. Each
//! statement is prepared with the PostgreSQL type of every parameter's tag, so
//! the server never has to infer a placeholder type from the column.

use crate::error::PersistenceError;
use crate::query::value_conversion::SqlParam;
use may_postgres::types::{ToSql, Type};
use may_postgres::{Client, Statement};
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Trait for executing document statements
///
/// Implemented by direct clients, pooled connections, and test doubles.
pub trait DocExecutor {
    /// Execute a statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the statement fails.
    fn execute(&self, query: &str, params: &[SqlParam]) -> Result<u64, PersistenceError>;

    /// Run a query and return the JSON text of `column` for every row
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the query fails or a row has no readable
    /// JSON in `column`.
    fn query_json(&self, query: &str, params: &[SqlParam], column: &str) -> Result<Vec<String>, PersistenceError>;
}

impl<E: DocExecutor + ?Sized> DocExecutor for &E {
    fn execute(&self, query: &str, params: &[SqlParam]) -> Result<u64, PersistenceError> {
        (**self).execute(query, params)
    }

    fn query_json(&self, query: &str, params: &[SqlParam], column: &str) -> Result<Vec<String>, PersistenceError> {
        (**self).query_json(query, params, column)
    }
}

/// Rewrite `?` placeholders as `$1`, `$2`, ... in order of appearance.
///
/// Question marks inside single-quoted literals or quoted identifiers are left
/// alone.
pub fn numbered_placeholders(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 8);
    let mut index = 0;
    let mut quote: Option<char> = None;

    for ch in query.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                out.push(ch);
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                '?' => {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                }
                _ => out.push(ch),
            },
        }
    }

    out
}

/// Implementation of `DocExecutor` for `may_postgres::Client`
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    /// Create a new executor from a `may_postgres::Client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Consume the executor and return the underlying client
    pub fn into_client(self) -> Client {
        self.client
    }

    /// Prepare `query` with the declared type of every parameter
    fn prepare(&self, query: &str, params: &[SqlParam]) -> Result<Statement, may_postgres::Error> {
        let types: Vec<Type> = params.iter().map(|p| p.sql_type().pg_type()).collect();
        self.client.prepare_typed(query, &types)
    }

    /// Check that the connection answers `SELECT 1`
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the probe query fails.
    pub fn check_health(&self) -> Result<bool, PersistenceError> {
        let row = self.client.query_one("SELECT 1", &[])?;
        let one: i32 = row.try_get(0)?;
        Ok(one == 1)
    }
}

impl DocExecutor for MayPostgresExecutor {
    fn execute(&self, query: &str, params: &[SqlParam]) -> Result<u64, PersistenceError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(query).entered();

        let sql = numbered_placeholders(query);
        let bound: Vec<&dyn ToSql> = params.iter().map(SqlParam::as_to_sql).collect();

        let start = Instant::now();
        let result = self
            .prepare(&sql, params)
            .and_then(|statement| self.client.execute(&statement, &bound))
            .map_err(|e| {
                #[cfg(feature = "metrics")]
                METRICS.record_query_error();
                PersistenceError::Postgres(e)
            });

        let duration = start.elapsed();
        #[cfg(feature = "metrics")]
        METRICS.record_query_duration(duration);
        log::debug!("Executed `{sql}` with {} parameter(s) in {duration:?}", params.len());

        result
    }

    fn query_json(&self, query: &str, params: &[SqlParam], column: &str) -> Result<Vec<String>, PersistenceError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(query).entered();

        let sql = numbered_placeholders(query);
        let bound: Vec<&dyn ToSql> = params.iter().map(SqlParam::as_to_sql).collect();

        let start = Instant::now();
        let rows = self
            .prepare(&sql, params)
            .and_then(|statement| self.client.query(&statement, &bound))
            .map_err(|e| {
                #[cfg(feature = "metrics")]
                METRICS.record_query_error();
                PersistenceError::Postgres(e)
            });

        let duration = start.elapsed();
        #[cfg(feature = "metrics")]
        METRICS.record_query_duration(duration);

        let rows = rows?;
        log::debug!("Query `{sql}` returned {} row(s) in {duration:?}", rows.len());

        rows.iter()
            .map(|row| -> Result<String, PersistenceError> {
                let json: serde_json::Value = row.try_get(column)?;
                Ok(json.to_string())
            })
            .collect()
    }
}
