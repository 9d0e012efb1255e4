//! Document-to-table metadata.
//!
//! [`DocumentMeta`] describes where a document type lives: its table, the
//! JSONB column holding the document body, the JSON field carrying its id, and
//! any extra columns projected alongside the body. A [`MetaRegistry`] holds the
//! metadata for every document type and is built once at startup, either in
//! code or from the `documents` configuration section.

use crate::pool::config::DocumentMetaConfig;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Prefix marking a column whose value the database generates
pub const AUTO_PREFIX: &str = "auto:";

/// An extra projected column.
///
/// Declared as a plain column name, or as `auto:<name>` for columns populated
/// by the database (sequences, defaults). Both kinds are projected in reads;
/// inserts write only the JSON column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnExtra {
    column: String,
    auto: bool,
}

impl ColumnExtra {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(AUTO_PREFIX) {
            Some(column) => ColumnExtra {
                column: column.to_string(),
                auto: true,
            },
            None => ColumnExtra {
                column: raw.to_string(),
                auto: false,
            },
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_auto(&self) -> bool {
        self.auto
    }
}

impl FromStr for ColumnExtra {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ColumnExtra::parse(s))
    }
}

impl From<&str> for ColumnExtra {
    fn from(raw: &str) -> Self {
        ColumnExtra::parse(raw)
    }
}

/// Metadata validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    /// A required field was empty
    Empty(&'static str),
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaError::Empty(field) => write!(f, "Document metadata field '{field}' must not be empty"),
        }
    }
}

impl std::error::Error for MetaError {}

/// How a document type maps onto a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    table: String,
    column: String,
    id_field: String,
    extra_columns: Vec<ColumnExtra>,
}

impl DocumentMeta {
    /// Build metadata from trusted, static values.
    ///
    /// Identifiers are interpolated into SQL verbatim, so they must never come
    /// from user input. Empty names are a caller bug; use [`DocumentMeta::try_new`]
    /// for values read from configuration.
    pub fn new(table: &str, column: &str, id_field: &str, extra_columns: &[&str]) -> Self {
        debug_assert!(!table.is_empty(), "table must not be empty");
        debug_assert!(!column.is_empty(), "column must not be empty");
        debug_assert!(!id_field.is_empty(), "id_field must not be empty");

        DocumentMeta {
            table: table.to_string(),
            column: column.to_string(),
            id_field: id_field.to_string(),
            extra_columns: extra_columns.iter().map(|raw| ColumnExtra::parse(raw)).collect(),
        }
    }

    pub fn try_new<S: AsRef<str>>(
        table: &str,
        column: &str,
        id_field: &str,
        extra_columns: &[S],
    ) -> Result<Self, MetaError> {
        if table.is_empty() {
            return Err(MetaError::Empty("table"));
        }
        if column.is_empty() {
            return Err(MetaError::Empty("column"));
        }
        if id_field.is_empty() {
            return Err(MetaError::Empty("id_field"));
        }

        Ok(DocumentMeta {
            table: table.to_string(),
            column: column.to_string(),
            id_field: id_field.to_string(),
            extra_columns: extra_columns.iter().map(|raw| ColumnExtra::parse(raw.as_ref())).collect(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// JSONB column holding the document body
    pub fn column(&self) -> &str {
        &self.column
    }

    /// JSON field inside the body that carries the document id
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn extra_columns(&self) -> &[ColumnExtra] {
        &self.extra_columns
    }
}

impl TryFrom<&DocumentMetaConfig> for DocumentMeta {
    type Error = MetaError;

    fn try_from(cfg: &DocumentMetaConfig) -> Result<Self, Self::Error> {
        DocumentMeta::try_new(&cfg.table, &cfg.column, &cfg.id_field, cfg.extra_columns.as_slice())
    }
}

/// Metadata for every known document type, keyed by document name
#[derive(Debug, Clone, Default)]
pub struct MetaRegistry {
    metas: HashMap<String, Arc<DocumentMeta>>,
}

impl MetaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the metadata for a document name
    pub fn register(&mut self, name: impl Into<String>, meta: DocumentMeta) -> &mut Self {
        self.metas.insert(name.into(), Arc::new(meta));
        self
    }

    pub fn with(mut self, name: impl Into<String>, meta: DocumentMeta) -> Self {
        self.register(name, meta);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<DocumentMeta>> {
        self.metas.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    /// Build a registry from the `documents` configuration section
    pub fn from_config(documents: &HashMap<String, DocumentMetaConfig>) -> Result<Self, MetaError> {
        let mut registry = MetaRegistry::new();
        for (name, cfg) in documents {
            let meta = DocumentMeta::try_from(cfg)?;
            log::debug!("Registered document '{name}' on table '{}'", meta.table());
            registry.register(name.clone(), meta);
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_extra_parse() {
        let extra = ColumnExtra::parse("col");
        assert_eq!(extra.column(), "col");
        assert!(!extra.is_auto());

        let auto = ColumnExtra::parse("auto:record_id");
        assert_eq!(auto.column(), "record_id");
        assert!(auto.is_auto());
    }

    #[test]
    fn test_column_extra_prefix_only_at_start() {
        let extra: ColumnExtra = "record_auto:id".parse().unwrap();
        assert_eq!(extra.column(), "record_auto:id");
        assert!(!extra.is_auto());

        let empty = ColumnExtra::from("auto:");
        assert_eq!(empty.column(), "");
        assert!(empty.is_auto());
    }

    #[test]
    fn test_document_meta_columns() {
        let meta = DocumentMeta::new("tbl", "data", "id", &["auto:record", "account_id"]);
        assert_eq!(meta.table(), "tbl");
        assert_eq!(meta.column(), "data");
        assert_eq!(meta.id_field(), "id");

        let all: Vec<&str> = meta.extra_columns().iter().map(ColumnExtra::column).collect();
        assert_eq!(all, vec!["record", "account_id"]);

        let auto: Vec<bool> = meta.extra_columns().iter().map(ColumnExtra::is_auto).collect();
        assert_eq!(auto, vec![true, false]);
    }

    #[test]
    fn test_try_new_rejects_empty_names() {
        let none: &[&str] = &[];
        assert_eq!(DocumentMeta::try_new("", "data", "id", none), Err(MetaError::Empty("table")));
        assert_eq!(DocumentMeta::try_new("tbl", "", "id", none), Err(MetaError::Empty("column")));
        assert_eq!(DocumentMeta::try_new("tbl", "data", "", none), Err(MetaError::Empty("id_field")));
    }

    #[test]
    fn test_registry_from_config() {
        let mut documents = HashMap::new();
        documents.insert(
            "account".to_string(),
            DocumentMetaConfig {
                table: "accounts".to_string(),
                column: "data".to_string(),
                id_field: "id".to_string(),
                extra_columns: vec!["auto:record_id".to_string()],
            },
        );

        let registry = MetaRegistry::from_config(&documents).unwrap();
        assert_eq!(registry.len(), 1);

        let meta = registry.get("account").unwrap();
        assert_eq!(meta.table(), "accounts");
        assert!(meta.extra_columns()[0].is_auto());
        assert!(registry.get("invoice").is_none());
    }

    #[test]
    fn test_registry_from_config_propagates_invalid_entry() {
        let mut documents = HashMap::new();
        documents.insert(
            "broken".to_string(),
            DocumentMetaConfig {
                table: String::new(),
                column: "data".to_string(),
                id_field: "id".to_string(),
                extra_columns: Vec::new(),
            },
        );

        assert_eq!(MetaRegistry::from_config(&documents).unwrap_err(), MetaError::Empty("table"));
    }
}
