//! SQL statement synthesis from document metadata.
//!
//! Statements use `?` placeholders; the executor renumbers them for
//! PostgreSQL. The spacing of generated SELECT text is fixed and relied on by
//! callers that compare statements literally.

use crate::meta::DocumentMeta;
use crate::query::criteria::{Criteria, OrderBy};

pub struct SqlBuilder;

impl SqlBuilder {
    /// `SELECT <column>  , <extra> , <extra> FROM <table>  WHERE <criteria>`
    ///
    /// Every extra column is projected, auto or not. The WHERE clause is left
    /// out when there are no criteria, and ORDER BY only appears when the
    /// criteria carry ordering terms.
    pub fn create_sql_select(meta: &DocumentMeta, criteria: Option<&Criteria>) -> String {
        let mut sql = String::from("SELECT ");
        sql.push_str(meta.column());
        sql.push(' ');

        for extra in meta.extra_columns() {
            sql.push_str(" , ");
            sql.push_str(extra.column());
        }

        sql.push_str(" FROM ");
        sql.push_str(meta.table());
        sql.push(' ');

        if let Some(criteria) = criteria {
            if !criteria.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&criteria.to_sql_string());
            }

            if !criteria.ordering().is_empty() {
                let terms: Vec<String> = criteria.ordering().iter().map(OrderBy::to_sql_string).collect();
                sql.push_str(" ORDER BY ");
                sql.push_str(&terms.join(", "));
            }
        }

        sql
    }

    /// `INSERT INTO <table> (<column>) VALUES (?)`
    pub fn create_sql_insert(meta: &DocumentMeta) -> String {
        format!("INSERT INTO {} ({}) VALUES (?)", meta.table(), meta.column())
    }
}
