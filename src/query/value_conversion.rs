//! Bound values and their mapping onto SQL parameter types.
//!
//! A [`Value`] is whatever a caller puts into a criterion. Before anything is
//! sent to the database every value is converted into a [`SqlParam`], whose
//! variant is the parameter type tag. The mapping is closed: text, 32-bit and
//! 64-bit integers and JSON documents are supported; any other kind fails with
//! [`TypeMappingError`].

use crate::error::TypeMappingError;
use bytes::{BufMut, BytesMut};
use may_postgres::types::{IsNull, ToSql, Type};
use postgres_types::to_sql_checked;
use std::error::Error;
use std::fmt;

/// JSON text bound as a `json`/`jsonb` parameter.
///
/// The text is sent as-is; for `jsonb` the binary format version byte is
/// written first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jsonb(String);

impl Jsonb {
    pub fn new(json: impl Into<String>) -> Self {
        Jsonb(json.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Jsonb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ToSql for Jsonb {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if *ty == Type::JSONB {
            out.put_u8(1);
        }
        out.put_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::JSON | Type::JSONB)
    }

    to_sql_checked!();
}

/// A value bound to a criterion placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i32),
    BigInt(i64),
    Json(Jsonb),
    Bool(bool),
    Double(f64),
    Null,
}

impl Value {
    /// Name of the value kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Int(_) => "i32",
            Value::BigInt(_) => "i64",
            Value::Json(_) => "json",
            Value::Bool(_) => "bool",
            Value::Double(_) => "f64",
            Value::Null => "null",
        }
    }

    /// Parameter type tag for this value, if it has one
    pub fn sql_type(&self) -> Result<SqlType, TypeMappingError> {
        match self {
            Value::Text(_) => Ok(SqlType::LongVarChar),
            Value::Int(_) => Ok(SqlType::Integer),
            Value::BigInt(_) => Ok(SqlType::BigInt),
            Value::Json(_) => Ok(SqlType::Other),
            Value::Bool(_) | Value::Double(_) | Value::Null => Err(TypeMappingError { kind: self.kind() }),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Jsonb> for Value {
    fn from(v: Jsonb) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// SQL parameter type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    LongVarChar,
    Integer,
    BigInt,
    /// Driver-specific object, used for JSON documents
    Other,
}

impl SqlType {
    /// PostgreSQL type a parameter with this tag is declared as
    pub fn pg_type(self) -> Type {
        match self {
            SqlType::LongVarChar => Type::TEXT,
            SqlType::Integer => Type::INT4,
            SqlType::BigInt => Type::INT8,
            SqlType::Other => Type::JSONB,
        }
    }
}

/// A value converted for binding; the variant is its parameter type
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    LongVarChar(String),
    Integer(i32),
    BigInt(i64),
    Other(Jsonb),
}

impl SqlParam {
    pub fn sql_type(&self) -> SqlType {
        match self {
            SqlParam::LongVarChar(_) => SqlType::LongVarChar,
            SqlParam::Integer(_) => SqlType::Integer,
            SqlParam::BigInt(_) => SqlType::BigInt,
            SqlParam::Other(_) => SqlType::Other,
        }
    }

    /// Borrow the parameter as a `may_postgres` bind value
    pub fn as_to_sql(&self) -> &dyn ToSql {
        match self {
            SqlParam::LongVarChar(s) => s,
            SqlParam::Integer(i) => i,
            SqlParam::BigInt(i) => i,
            SqlParam::Other(j) => j,
        }
    }
}

impl TryFrom<&Value> for SqlParam {
    type Error = TypeMappingError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(s) => Ok(SqlParam::LongVarChar(s.clone())),
            Value::Int(i) => Ok(SqlParam::Integer(*i)),
            Value::BigInt(i) => Ok(SqlParam::BigInt(*i)),
            Value::Json(j) => Ok(SqlParam::Other(j.clone())),
            other => Err(TypeMappingError { kind: other.kind() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_kinds_map_to_fixed_tags() {
        assert_eq!(Value::from("abc").sql_type(), Ok(SqlType::LongVarChar));
        assert_eq!(Value::from(7i32).sql_type(), Ok(SqlType::Integer));
        assert_eq!(Value::from(7i64).sql_type(), Ok(SqlType::BigInt));
        assert_eq!(Value::from(Jsonb::new("{}")).sql_type(), Ok(SqlType::Other));
    }

    #[test]
    fn test_tags_declare_postgres_types() {
        assert_eq!(SqlType::LongVarChar.pg_type(), Type::TEXT);
        assert_eq!(SqlType::Integer.pg_type(), Type::INT4);
        assert_eq!(SqlType::BigInt.pg_type(), Type::INT8);
        assert_eq!(SqlType::Other.pg_type(), Type::JSONB);

        // Each declared type is one the bound Rust value accepts.
        let params = [
            SqlParam::LongVarChar("abc".to_string()),
            SqlParam::Integer(1),
            SqlParam::BigInt(1),
            SqlParam::Other(Jsonb::new("{}")),
        ];
        for param in &params {
            let ty = param.sql_type().pg_type();
            let mut out = BytesMut::new();
            assert!(param.as_to_sql().to_sql_checked(&ty, &mut out).is_ok(), "{param:?} rejected {ty}");
        }
    }

    #[test]
    fn test_unsupported_kinds_fail() {
        for value in [Value::Bool(true), Value::Double(1.5), Value::from(None::<i32>)] {
            let err = SqlParam::try_from(&value).unwrap_err();
            assert_eq!(err.kind, value.kind());
            assert_eq!(value.sql_type(), Err(err));
        }
    }

    #[test]
    fn test_param_tag_matches_value_tag() {
        let value = Value::from(Some("acct-9"));
        let param = SqlParam::try_from(&value).unwrap();
        assert_eq!(param, SqlParam::LongVarChar("acct-9".to_string()));
        assert_eq!(Ok(param.sql_type()), value.sql_type());
    }

    #[test]
    fn test_jsonb_to_sql_writes_version_byte() {
        let doc = Jsonb::new(r#"{"id":"1"}"#);

        let mut out = BytesMut::new();
        doc.to_sql(&Type::JSONB, &mut out).unwrap();
        assert_eq!(out[0], 1);
        assert_eq!(&out[1..], br#"{"id":"1"}"#);

        let mut out = BytesMut::new();
        doc.to_sql(&Type::JSON, &mut out).unwrap();
        assert_eq!(&out[..], br#"{"id":"1"}"#);

        assert!(<Jsonb as ToSql>::accepts(&Type::JSONB));
        assert!(!<Jsonb as ToSql>::accepts(&Type::TEXT));
    }
}
