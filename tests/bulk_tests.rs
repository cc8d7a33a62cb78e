//! Integration tests for bulk loading.
//!
//! Tests cover:
//! - Bulk create followed by reads
//! - Bulk insert into an existing table, in order
//! - Constraint violations

use dbtasks::models::table::{ColumnSpec, TableSpec};
use dbtasks::models::value::{DbType, DbValue, Params};
use dbtasks::session::MemoryDatabase;
use dbtasks::{Config, Db, Error};
use serde_json::json;
use std::sync::Arc;

fn db() -> Db {
    Db::new(Arc::new(MemoryDatabase::new()), &Config::default())
}

fn columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("id", DbType::BigInt).primary(),
        ColumnSpec::new("name", DbType::NVarChar(Some(50))).nullable(),
    ]
}

fn rows(range: std::ops::Range<i64>) -> Vec<Vec<DbValue>> {
    range
        .map(|i| vec![DbValue::Int(i), DbValue::Text(format!("row {}", i))])
        .collect()
}

#[tokio::test]
async fn test_bulk_insert_into_empty_table() {
    let db = db();
    db.command(
        "",
        "CREATE TABLE people (id bigint PRIMARY KEY, name nvarchar(50) NULL)",
        &Params::new(),
        None,
    )
    .await
    .unwrap();

    let table = TableSpec::new("people", columns()).with_rows(rows(0..4));
    db.bulk_insert("", &table, None).await.unwrap();

    let out = db
        .recordset("", "SELECT * FROM people", &Params::new(), None)
        .await
        .unwrap();
    let ids: Vec<_> = out.value.iter().map(|row| row["id"].clone()).collect();
    assert_eq!(ids, vec![json!(0), json!(1), json!(2), json!(3)]);
    assert_eq!(out.value[2]["name"], json!("row 2"));
}

#[tokio::test]
async fn test_bulk_create_then_insert_more() {
    let db = db();
    let table = TableSpec::new("people", columns()).with_rows(rows(0..4));
    db.bulk_create("", &table, None).await.unwrap();

    let more = TableSpec::new("people", columns()).with_rows(rows(4..8));
    db.bulk_insert("", &more, None).await.unwrap();

    let out = db
        .recordset("", "SELECT * FROM people", &Params::new(), None)
        .await
        .unwrap();
    assert_eq!(out.value.len(), 8);
    assert_eq!(out.value[7]["id"], json!(7));
}

#[tokio::test]
async fn test_bulk_insert_primary_key_violation() {
    let db = db();
    let table = TableSpec::new("people", columns()).with_rows(rows(0..2));
    db.bulk_create("", &table, None).await.unwrap();

    let err = db.bulk_insert("", &table, None).await.unwrap_err();
    assert!(matches!(err, Error::Statement { .. }));
}

#[tokio::test]
async fn test_bulk_insert_missing_table() {
    let db = db();
    let table = TableSpec::new("nowhere", columns()).with_rows(rows(0..1));
    assert!(matches!(
        db.bulk_insert("", &table, None).await,
        Err(Error::Statement { .. })
    ));
}

#[tokio::test]
async fn test_row_width_mismatch_is_rejected() {
    let db = db();
    let table = TableSpec::new("people", columns()).with_rows(vec![vec![DbValue::Int(1)]]);
    assert!(db.bulk_create("", &table, None).await.is_err());
}

#[tokio::test]
async fn test_failed_bulk_insert_leaves_no_rows() {
    let db = db();
    db.command("", "CREATE TABLE p (id bigint PRIMARY KEY)", &Params::new(), None)
        .await
        .unwrap();

    let ids = vec![ColumnSpec::new("id", DbType::BigInt).primary()];
    let table = TableSpec::new("p", ids).with_rows(vec![
        vec![DbValue::Int(1)],
        vec![DbValue::Int(2)],
        vec![DbValue::Int(1)],
    ]);
    assert!(matches!(
        db.bulk_insert("", &table, None).await,
        Err(Error::Statement { .. })
    ));

    let count = db
        .scalar("", "SELECT COUNT(*) FROM p", &Params::new(), None)
        .await
        .unwrap();
    assert_eq!(count.value, json!(0));
}

#[tokio::test]
async fn test_failed_bulk_create_leaves_no_table() {
    let db = db();
    let mut data = rows(0..3);
    data.push(vec![DbValue::Int(1), DbValue::Null]);
    let table = TableSpec::new("people", columns()).with_rows(data);
    assert!(matches!(
        db.bulk_create("", &table, None).await,
        Err(Error::Statement { .. })
    ));

    assert!(db
        .scalar("", "SELECT COUNT(*) FROM people", &Params::new(), None)
        .await
        .is_err());
    db.bulk_create("", &TableSpec::new("people", columns()).with_rows(rows(0..3)), None)
        .await
        .unwrap();
}
