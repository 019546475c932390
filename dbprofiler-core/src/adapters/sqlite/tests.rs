//! Tests for the SQLite adapter internals.

use serde_json::{Value, json};

use super::SqliteAdapter;
use super::catalog::tables_sql;
use super::connection::{classify_result_code, is_memory_database};
use super::statistics::{aggregate_sql, count_sql, row_to_map};
use crate::adapters::{Aggregate, ConnectionConfig, DatabaseAdapter};
use crate::error::ConnectionErrorKind;
use crate::ConnectionDescriptor;

async fn memory_adapter() -> SqliteAdapter {
    SqliteAdapter::connect(
        &ConnectionDescriptor::sqlite(":memory:"),
        &ConnectionConfig::default(),
    )
    .await
    .expect("in-memory SQLite should open")
}

#[test]
fn test_memory_detection() {
    assert!(is_memory_database(":memory:"));
    assert!(is_memory_database("sqlite::memory:"));
    assert!(!is_memory_database("/tmp/app.db"));
}

#[test]
fn test_result_code_classification() {
    assert_eq!(
        classify_result_code(14),
        Some(ConnectionErrorKind::DatabaseNotFound)
    );
    // SQLITE_CANTOPEN_ISDIR
    assert_eq!(
        classify_result_code(526),
        Some(ConnectionErrorKind::DatabaseNotFound)
    );
    assert_eq!(classify_result_code(1), None);
}

#[test]
fn test_sql_builders() {
    assert_eq!(
        tables_sql("main"),
        "SELECT name FROM \"main\".sqlite_master WHERE type = 'table' ORDER BY name"
    );
    assert_eq!(
        count_sql("main", "orders"),
        "SELECT COUNT(*) FROM \"main\".\"orders\""
    );
    assert_eq!(
        aggregate_sql("main", "orders", "total", Aggregate::Min),
        "SELECT MIN(\"total\") AS value FROM \"main\".\"orders\""
    );
}

#[tokio::test]
async fn test_row_decoding_covers_storage_classes() {
    let adapter = memory_adapter().await;
    let row = sqlx::query("SELECT 'text' AS t, 42 AS i, 1.5 AS f, x'DEADBEEF' AS b, NULL AS n")
        .fetch_one(&adapter.pool)
        .await
        .unwrap();

    let map = row_to_map(&row).unwrap();
    let keys: Vec<&str> = map.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["t", "i", "f", "b", "n"]);
    assert_eq!(map["t"], json!("text"));
    assert_eq!(map["i"], json!(42));
    assert_eq!(map["f"], json!(1.5));
    assert_eq!(map["b"], json!("base64:3q2+7w=="));
    assert_eq!(map["n"], Value::Null);
}

#[tokio::test]
async fn test_server_settings() {
    let adapter = memory_adapter().await;
    let settings = adapter.server_settings().await.unwrap();
    assert_eq!(settings.character_encoding, "UTF-8");
    assert_eq!(settings.collation, "BINARY");
}

#[tokio::test]
async fn test_aggregates_on_empty_table_are_none() {
    let adapter = memory_adapter().await;
    adapter
        .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
        .await
        .unwrap();

    assert_eq!(adapter.count_rows("main", "t").await.unwrap(), 0);
    assert_eq!(
        adapter.aggregate("main", "t", "v", Aggregate::Min).await.unwrap(),
        None
    );
    assert_eq!(
        adapter.aggregate("main", "t", "v", Aggregate::Max).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_bound_parameters() {
    let adapter = memory_adapter().await;
    adapter
        .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT, n REAL)", &[])
        .await
        .unwrap();
    let inserted = adapter
        .execute(
            "INSERT INTO t (v, n) VALUES (?1, ?2)",
            &[json!("it's quoted"), json!(2.25)],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let rows = adapter
        .fetch("SELECT v, n FROM t WHERE v = ?1", &[json!("it's quoted")])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["n"], json!(2.25));

    let count = adapter
        .fetch_count("SELECT COUNT(*) FROM t WHERE v IS ?1", &[Value::Null])
        .await
        .unwrap();
    assert_eq!(count, 0);
}
