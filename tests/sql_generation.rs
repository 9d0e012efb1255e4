//! Literal-text checks for generated statements through the public API.
//!
//! Statement text is compared byte for byte; callers and fixtures depend on
//! the exact spacing.

use docdb::{ColumnExtra, Criteria, Criterion, DocumentMeta, SqlBuilder, SqlParam, Value};

#[test]
fn test_criteria_sql_strings() {
    let cr = Criterion::column("column", "test");
    assert_eq!(cr.column_name(), "column");
    assert_eq!(cr.value(), &Value::from("test"));
    assert_eq!(cr.to_sql_string(), "column=?");

    let field = Criterion::json_field("column", "id", "abc");
    assert_eq!(field.field(), Some("id"));
    assert_eq!(field.value(), &Value::from("abc"));
    assert_eq!(field.to_sql_string(), "column->>'id'=?");

    let mut criteria = Criteria::new();
    criteria.add(cr);
    criteria.add(field);
    assert_eq!(
        criteria.to_sql_string(),
        format!("column=?{}column->>'id'=?", Criteria::SQL_STMT_DELIM)
    );

    let extra = ColumnExtra::parse("col");
    let extra_auto = ColumnExtra::parse("auto:record_id");
    assert_eq!(extra.column(), "col");
    assert!(!extra.is_auto());
    assert_eq!(extra_auto.column(), "record_id");
    assert!(extra_auto.is_auto());
}

#[test]
fn test_sql_builder() {
    let criteria = Criteria::new().with(Criterion::json_field("column", "id", "abc"));
    let meta = DocumentMeta::new("tbl", "data", "id", &["auto:record", "account_id"]);

    assert_eq!(
        SqlBuilder::create_sql_select(&meta, Some(&criteria)),
        "SELECT data  , record , account_id FROM tbl  WHERE column->>'id'=?"
    );
    assert_eq!(SqlBuilder::create_sql_insert(&meta), "INSERT INTO tbl (data) VALUES (?)");
}

#[test]
fn test_placeholders_line_up_with_bound_params() {
    let criteria = Criteria::new()
        .with(Criterion::column("tenant_id", 12i64))
        .with(Criterion::json_field("data", "status", "open"))
        .with(Criterion::column("shard", 3i32));

    let sql = criteria.to_sql_string();
    assert_eq!(sql.matches('?').count(), criteria.len());

    let params = criteria.bind().expect("all kinds are mapped");
    assert_eq!(
        params,
        vec![
            SqlParam::BigInt(12),
            SqlParam::LongVarChar("open".to_string()),
            SqlParam::Integer(3),
        ]
    );
}
