//! Error types for the document store.
//!
//! Two families exist: [`PersistenceError`] for anything that goes wrong while
//! talking to the database or (de)serializing documents, and
//! [`TypeMappingError`] for a bound value that has no SQL parameter type.
//! Store operations return [`DocError`], which carries either one.

use crate::connection::ConnectionError;
use may_postgres::Error as PostgresError;
use std::fmt;
use std::time::Duration;

/// Failure while acquiring a connection, executing a statement, or
/// converting a document to or from JSON.
#[derive(Debug)]
pub enum PersistenceError {
    /// `PostgreSQL` error from `may_postgres`
    Postgres(PostgresError),
    /// Connection could not be established
    Connection(ConnectionError),
    /// No pooled connection became free in time
    PoolTimeout(Duration),
    /// Document could not be serialized to JSON
    Serialize(serde_json::Error),
    /// Row JSON could not be deserialized into the target type
    Deserialize(serde_json::Error),
    /// No metadata registered for the document name
    UnknownDocument(String),
    /// Other persistence errors
    Other(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Postgres(e) => write!(f, "PostgreSQL error: {e}"),
            PersistenceError::Connection(e) => write!(f, "Connection error: {e}"),
            PersistenceError::PoolTimeout(waited) => {
                write!(f, "Timed out after {waited:?} waiting for a pooled connection")
            }
            PersistenceError::Serialize(e) => write!(f, "Unable to serialize document: {e}"),
            PersistenceError::Deserialize(e) => write!(f, "Unable to deserialize document: {e}"),
            PersistenceError::UnknownDocument(name) => {
                write!(f, "No metadata registered for document '{name}'")
            }
            PersistenceError::Other(s) => write!(f, "Persistence error: {s}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Postgres(e) => Some(e),
            PersistenceError::Connection(e) => Some(e),
            PersistenceError::Serialize(e) | PersistenceError::Deserialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PostgresError> for PersistenceError {
    fn from(err: PostgresError) -> Self {
        PersistenceError::Postgres(err)
    }
}

impl From<ConnectionError> for PersistenceError {
    fn from(err: ConnectionError) -> Self {
        PersistenceError::Connection(err)
    }
}

/// A bound value whose kind has no SQL parameter type mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMappingError {
    /// Name of the unsupported value kind
    pub kind: &'static str,
}

impl fmt::Display for TypeMappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type not supported: {}", self.kind)
    }
}

impl std::error::Error for TypeMappingError {}

/// Error returned by every [`DocumentStore`](crate::DocumentStore) operation
#[derive(Debug)]
pub enum DocError {
    Persistence(PersistenceError),
    TypeMapping(TypeMappingError),
}

impl DocError {
    pub fn is_type_mapping(&self) -> bool {
        matches!(self, DocError::TypeMapping(_))
    }
}

impl fmt::Display for DocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocError::Persistence(e) => e.fmt(f),
            DocError::TypeMapping(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for DocError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocError::Persistence(e) => Some(e),
            DocError::TypeMapping(e) => Some(e),
        }
    }
}

impl From<PersistenceError> for DocError {
    fn from(err: PersistenceError) -> Self {
        DocError::Persistence(err)
    }
}

impl From<TypeMappingError> for DocError {
    fn from(err: TypeMappingError) -> Self {
        DocError::TypeMapping(err)
    }
}
