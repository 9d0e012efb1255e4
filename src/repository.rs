//! Document repository over JSONB rows.
//!
//! [`DocumentStore`] saves typed documents as JSON into the column described by
//! their [`DocumentMeta`] and reads them back by id or by [`Criteria`].
//! Every operation is independent: metadata lookup, statement building and
//! parameter binding happen first, then a connection is acquired for the one
//! statement and released before the call returns.
//!
//! # Examples
//!
//! ```no_run
//! use docdb::{Criteria, Criterion, DatabaseConfig, DbPool, Document, DocumentMeta, DocumentStore, MetaRegistry};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Account {
//!     id: Option<String>,
//!     owner: String,
//! }
//!
//! impl Document for Account {
//!     const NAME: &'static str = "account";
//!
//!     fn set_id(&mut self, id: String) {
//!         self.id = Some(id);
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MetaRegistry::new().with("account", DocumentMeta::new("accounts", "data", "id", &[]));
//! let store = DocumentStore::new(DbPool::connect(&DatabaseConfig::load()?)?, registry);
//!
//! let mut account = Account { id: None, owner: "ana".to_string() };
//! let id = store.save(&mut account)?;
//!
//! let found: Option<Account> = store.find_by_id(&id)?;
//! let owned: Vec<Account> = store.find(Some(&Criteria::new().with(Criterion::json_field("data", "owner", "ana"))))?;
//! # Ok(())
//! # }
//! ```

use crate::error::{DocError, PersistenceError};
use crate::executor::DocExecutor;
use crate::meta::{DocumentMeta, MetaRegistry};
use crate::pool::manager::ConnectionProvider;
use crate::query::builder::SqlBuilder;
use crate::query::criteria::{Criteria, Criterion};
use crate::query::value_conversion::{Jsonb, SqlParam};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// A type stored as a JSON document
pub trait Document: Serialize + DeserializeOwned {
    /// Name the document's metadata is registered under
    const NAME: &'static str;

    /// Store a newly generated id in the document's id field
    fn set_id(&mut self, id: String);
}

/// Saves and finds documents through a [`ConnectionProvider`]
pub struct DocumentStore<P> {
    provider: P,
    registry: Arc<MetaRegistry>,
}

impl<P: ConnectionProvider> DocumentStore<P> {
    pub fn new(provider: P, registry: impl Into<Arc<MetaRegistry>>) -> Self {
        DocumentStore {
            provider,
            registry: registry.into(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn registry(&self) -> &MetaRegistry {
        &self.registry
    }

    /// Metadata registered for `T`
    pub fn meta<T: Document>(&self) -> Result<Arc<DocumentMeta>, PersistenceError> {
        self.registry
            .get(T::NAME)
            .ok_or_else(|| PersistenceError::UnknownDocument(T::NAME.to_string()))
    }

    /// Insert `document` under a freshly generated id.
    ///
    /// The id is written into the caller's document before it is serialized,
    /// and returned.
    pub fn save<T: Document>(&self, document: &mut T) -> Result<String, DocError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::document_span("save", T::NAME).entered();

        let meta = self.meta::<T>()?;

        let id = Uuid::new_v4().to_string();
        document.set_id(id.clone());

        let json = serde_json::to_string(document).map_err(PersistenceError::Serialize)?;
        let insert = SqlBuilder::create_sql_insert(&meta);
        let params = [SqlParam::Other(Jsonb::new(json))];

        let connection = self.provider.acquire()?;
        connection.execute(&insert, &params).map_err(|e| {
            log::debug!("Unable to save {} document {id}: {e}", T::NAME);
            e
        })?;

        #[cfg(feature = "metrics")]
        METRICS.record_document_saved();
        log::debug!("Saved {} document {id}", T::NAME);

        Ok(id)
    }

    /// Find the document whose id field equals `id`
    pub fn find_by_id<T: Document>(&self, id: &str) -> Result<Option<T>, DocError> {
        self.find_by_id_with(id, Criteria::new())
    }

    /// Find the document with `id` that also matches `criteria`
    pub fn find_by_id_with<T: Document>(&self, id: &str, mut criteria: Criteria) -> Result<Option<T>, DocError> {
        let meta = self.meta::<T>()?;
        criteria.add(Criterion::json_field(meta.column(), meta.id_field(), id));
        self.find_one(Some(&criteria))
    }

    /// First document matching `criteria`, if any.
    ///
    /// Row order is whatever the database returns unless the criteria carry
    /// ordering terms.
    pub fn find_one<T: Document>(&self, criteria: Option<&Criteria>) -> Result<Option<T>, DocError> {
        Ok(self.find(criteria)?.into_iter().next())
    }

    /// Every document of type `T`
    pub fn find_all<T: Document>(&self) -> Result<Vec<T>, DocError> {
        self.find(None)
    }

    /// All documents matching `criteria`; `None` or empty criteria match everything.
    ///
    /// A row that fails to deserialize fails the whole read.
    pub fn find<T: Document>(&self, criteria: Option<&Criteria>) -> Result<Vec<T>, DocError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::document_span("find", T::NAME).entered();

        let meta = self.meta::<T>()?;
        let select = SqlBuilder::create_sql_select(&meta, criteria);
        let params = match criteria {
            Some(criteria) => criteria.bind()?,
            None => Vec::new(),
        };

        let rows = {
            let connection = self.provider.acquire()?;
            connection.query_json(&select, &params, meta.column())?
        };

        let documents = rows
            .iter()
            .map(|json| serde_json::from_str::<T>(json).map_err(PersistenceError::Deserialize))
            .collect::<Result<Vec<T>, PersistenceError>>()?;

        log::debug!("Found {} {} document(s)", documents.len(), T::NAME);
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::value_conversion::Value;
    use crate::test_helpers::{Recorded, RecordingProvider};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        #[serde(default)]
        id: Option<String>,
        owner: String,
        balance: i64,
    }

    impl Document for Account {
        const NAME: &'static str = "account";

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Unregistered {
        id: String,
    }

    impl Document for Unregistered {
        const NAME: &'static str = "unregistered";

        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    fn registry() -> MetaRegistry {
        MetaRegistry::new().with("account", DocumentMeta::new("accounts", "data", "id", &["auto:record_id", "tenant"]))
    }

    fn account() -> Account {
        Account {
            id: None,
            owner: "ana".to_string(),
            balance: 120,
        }
    }

    #[test]
    fn test_save_assigns_id_and_inserts_json() {
        let provider = RecordingProvider::new();
        let store = DocumentStore::new(&provider, registry());

        let mut doc = account();
        let id = store.save(&mut doc).unwrap();

        assert_eq!(doc.id.as_deref(), Some(id.as_str()));
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(provider.acquire_count(), 1);

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        let Recorded { sql, params } = &calls[0];
        assert_eq!(sql, "INSERT INTO accounts (data) VALUES (?)");
        assert_eq!(params.len(), 1);
        match &params[0] {
            SqlParam::Other(json) => {
                let saved: Account = serde_json::from_str(json.as_str()).unwrap();
                assert_eq!(saved, doc);
            }
            other => panic!("expected JSON parameter, got {other:?}"),
        }
    }

    #[test]
    fn test_each_save_gets_a_new_id() {
        let provider = RecordingProvider::new();
        let store = DocumentStore::new(&provider, registry());

        let mut first = account();
        let mut second = account();
        let a = store.save(&mut first).unwrap();
        let b = store.save(&mut second).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_save_then_find_by_id_round_trip() {
        let provider = RecordingProvider::new();
        let store = DocumentStore::new(&provider, registry());

        let mut doc = account();
        let id = store.save(&mut doc).unwrap();
        let calls = provider.calls();
        let inserted = match &calls[0].params[0] {
            SqlParam::Other(json) => json.as_str().to_string(),
            other => panic!("expected JSON parameter, got {other:?}"),
        };

        provider.push_rows(vec![inserted]);
        let found: Account = store.find_by_id(&id).unwrap().unwrap();
        assert_eq!(found, doc);

        let calls = provider.calls();
        let query = &calls[1];
        assert_eq!(query.sql, "SELECT data  , record_id , tenant FROM accounts  WHERE data->>'id'=?");
        assert_eq!(query.params, vec![SqlParam::LongVarChar(id)]);
    }

    #[test]
    fn test_find_by_id_with_appends_id_predicate() {
        let provider = RecordingProvider::new();
        let store = DocumentStore::new(&provider, registry());

        let criteria = Criteria::new().with(Criterion::column("tenant", 9i32));
        let found: Option<Account> = store.find_by_id_with("abc", criteria).unwrap();
        assert!(found.is_none());

        let calls = provider.calls();
        let call = &calls[0];
        assert_eq!(
            call.sql,
            "SELECT data  , record_id , tenant FROM accounts  WHERE tenant=? AND data->>'id'=?"
        );
        assert_eq!(call.params, vec![SqlParam::Integer(9), SqlParam::LongVarChar("abc".to_string())]);
    }

    #[test]
    fn test_find_binds_in_criteria_order() {
        let provider = RecordingProvider::new();
        let store = DocumentStore::new(&provider, registry());

        let criteria = Criteria::new()
            .with(Criterion::json_field("data", "owner", "ana"))
            .with(Criterion::column("tenant", 77i64));
        let _: Vec<Account> = store.find(Some(&criteria)).unwrap();

        let calls = provider.calls();
        let call = &calls[0];
        assert_eq!(
            call.sql,
            "SELECT data  , record_id , tenant FROM accounts  WHERE data->>'owner'=? AND tenant=?"
        );
        assert_eq!(call.params, vec![SqlParam::LongVarChar("ana".to_string()), SqlParam::BigInt(77)]);
        let values: Vec<Value> = criteria.values().into_iter().cloned().collect();
        assert_eq!(values, vec![Value::from("ana"), Value::from(77i64)]);
    }

    #[test]
    fn test_find_without_matches_returns_empty() {
        let provider = RecordingProvider::new();
        let store = DocumentStore::new(&provider, registry());

        let criteria = Criteria::new().with(Criterion::json_field("data", "owner", "nobody"));
        let found: Vec<Account> = store.find(Some(&criteria)).unwrap();
        assert!(found.is_empty());

        let one: Option<Account> = store.find_one(Some(&criteria)).unwrap();
        assert!(one.is_none());
    }

    #[test]
    fn test_find_all_without_where_clause() {
        let provider = RecordingProvider::new();
        provider.push_rows(vec![
            r#"{"id":"1","owner":"ana","balance":1}"#.to_string(),
            r#"{"id":"2","owner":"bo","balance":2}"#.to_string(),
        ]);
        let store = DocumentStore::new(&provider, registry());

        let all: Vec<Account> = store.find_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].owner, "bo");

        let calls = provider.calls();
        let call = &calls[0];
        assert_eq!(call.sql, "SELECT data  , record_id , tenant FROM accounts ");
        assert!(call.params.is_empty());
    }

    #[test]
    fn test_find_one_returns_first_row() {
        let provider = RecordingProvider::new();
        provider.push_rows(vec![
            r#"{"id":"1","owner":"ana","balance":1}"#.to_string(),
            r#"{"id":"2","owner":"ana","balance":2}"#.to_string(),
        ]);
        let store = DocumentStore::new(&provider, registry());

        let criteria = Criteria::new().with(Criterion::json_field("data", "owner", "ana"));
        let first: Account = store.find_one(Some(&criteria)).unwrap().unwrap();
        assert_eq!(first.id.as_deref(), Some("1"));
    }

    #[test]
    fn test_one_bad_row_fails_whole_read() {
        let provider = RecordingProvider::new();
        provider.push_rows(vec![
            r#"{"id":"1","owner":"ana","balance":1}"#.to_string(),
            r#"{"id":"2","owner":"bo"}"#.to_string(),
        ]);
        let store = DocumentStore::new(&provider, registry());

        let err = store.find_all::<Account>().unwrap_err();
        assert!(matches!(err, DocError::Persistence(PersistenceError::Deserialize(_))));
    }

    #[test]
    fn test_unmapped_value_fails_before_acquire() {
        let provider = RecordingProvider::new();
        let store = DocumentStore::new(&provider, registry());

        let criteria = Criteria::new()
            .with(Criterion::json_field("data", "owner", "ana"))
            .with(Criterion::column("active", true));

        let err = store.find::<Account>(Some(&criteria)).unwrap_err();
        assert!(err.is_type_mapping());
        assert_eq!(provider.acquire_count(), 0);
        assert!(provider.calls().is_empty());

        let err = store.find_by_id_with::<Account>("abc", criteria).unwrap_err();
        assert!(err.is_type_mapping());
        assert_eq!(provider.acquire_count(), 0);
    }

    #[test]
    fn test_unregistered_document() {
        let provider = RecordingProvider::new();
        let store = DocumentStore::new(&provider, registry());

        let mut doc = Unregistered { id: String::new() };
        let err = store.save(&mut doc).unwrap_err();
        assert!(matches!(err, DocError::Persistence(PersistenceError::UnknownDocument(ref name)) if name == "unregistered"));
        assert!(doc.id.is_empty());
        assert_eq!(provider.acquire_count(), 0);
    }

    #[test]
    fn test_execution_failure_is_persistence_error() {
        let provider = RecordingProvider::new();
        provider.fail_next("duplicate key value violates unique constraint");
        let store = DocumentStore::new(&provider, registry());

        let mut doc = account();
        let err = store.save(&mut doc).unwrap_err();
        assert!(matches!(err, DocError::Persistence(PersistenceError::Other(_))));
        assert!(err.to_string().contains("duplicate key"));
        assert_eq!(provider.released_count(), 1);
    }

    #[test]
    fn test_acquire_failure_propagates() {
        let provider = RecordingProvider::new();
        provider.refuse_connections();
        let store = DocumentStore::new(&provider, registry());

        let err = store.find_all::<Account>().unwrap_err();
        assert!(matches!(err, DocError::Persistence(PersistenceError::PoolTimeout(_))));
    }

    #[test]
    fn test_connection_released_after_each_call() {
        let provider = RecordingProvider::new();
        let store = DocumentStore::new(&provider, registry());

        let mut doc = account();
        store.save(&mut doc).unwrap();
        let _ = store.find_by_id::<Account>("missing").unwrap();
        provider.push_rows(vec!["not json".to_string()]);
        let _ = store.find_all::<Account>().unwrap_err();

        assert_eq!(provider.acquire_count(), 3);
        assert_eq!(provider.released_count(), 3);
    }
}
