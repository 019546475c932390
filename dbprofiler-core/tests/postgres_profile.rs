//! PostgreSQL profiling and anomaly tests against a real server.
//!
//! Each test starts its own container via testcontainers.

#![cfg(feature = "postgresql")]

use std::time::Duration;

use dbprofiler_core::{
    ConnectionConfig, ConnectionDescriptor, ConnectionErrorKind, DatabaseEngine, DbProfilerError,
    Session, anomaly, connect, connect_with_config, profile, statistics,
};
use serde_json::{Value, json};
use testcontainers_modules::{
    postgres::Postgres,
    testcontainers::{ContainerAsync, runners::AsyncRunner},
};

fn descriptor(port: u16, password: &str, database: &str) -> ConnectionDescriptor {
    ConnectionDescriptor::new(
        DatabaseEngine::PostgreSQL,
        "postgres",
        password,
        "localhost",
        database,
    )
    .with_port(port)
}

/// Starts PostgreSQL and waits until it accepts sessions
async fn start_postgres() -> (ContainerAsync<Postgres>, u16) {
    let container = Postgres::default().start().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();

    let max_attempts = 30;
    for attempt in 1..=max_attempts {
        if let Ok(session) = connect(&descriptor(port, "postgres", "postgres")).await {
            session.disconnect().await;
            return (container, port);
        }
        if attempt < max_attempts {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
    panic!(
        "PostgreSQL failed to become ready after {} attempts",
        max_attempts
    );
}

async fn seeded_session(port: u16) -> Session {
    let session = connect(&descriptor(port, "postgres", "postgres")).await.unwrap();
    session
        .execute_query(
            "CREATE TABLE test_table (id SERIAL PRIMARY KEY, name VARCHAR(50) NOT NULL, price NUMERIC(10,2), note TEXT);
             INSERT INTO test_table (name, price, note) VALUES ('first', 9.50, 'ok');",
        )
        .await
        .unwrap();
    session
}

fn table_json(document: &dbprofiler_core::ProfileDocument, table: &str) -> Value {
    let profile = document.get("postgres").unwrap();
    let schema = profile.schema("public").unwrap();
    schema
        .table(table)
        .map(|t| serde_json::to_value(t).unwrap())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn test_postgres_connection_errors_are_classified() {
    let (_container, port) = start_postgres().await;

    let err = connect(&descriptor(port, "wrong-password", "postgres"))
        .await
        .unwrap_err();
    assert_eq!(
        err.connection_kind(),
        Some(ConnectionErrorKind::AuthenticationFailed)
    );
    assert!(!err.to_string().contains("wrong-password"));

    let err = connect(&descriptor(port, "postgres", "no_such_database"))
        .await
        .unwrap_err();
    assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::DatabaseNotFound));

    let config = ConnectionConfig::new().with_connect_timeout(Duration::from_secs(2));
    let unreachable = ConnectionDescriptor::new(
        DatabaseEngine::PostgreSQL,
        "postgres",
        "postgres",
        "host.invalid",
        "postgres",
    );
    let err = connect_with_config(&unreachable, &config).await.unwrap_err();
    assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::HostUnreachable));
}

#[tokio::test]
async fn test_postgres_slow_query_is_query_timeout() {
    let (_container, port) = start_postgres().await;
    let config = ConnectionConfig::new().with_query_timeout(Duration::from_millis(300));
    let session = connect_with_config(&descriptor(port, "postgres", "postgres"), &config)
        .await
        .unwrap();

    let err = session.fetch_data("SELECT pg_sleep(1)").await.unwrap_err();
    assert!(matches!(err, DbProfilerError::QueryTimeout { .. }));
    assert!(err.is_fatal());

    session.disconnect().await;
}

#[tokio::test]
async fn test_postgres_profile_round_trip() {
    let (_container, port) = start_postgres().await;
    let session = seeded_session(port).await;

    let document = profile(&session, "postgres").await.unwrap();
    let database = document.get("postgres").unwrap();
    assert_eq!(database.character_encoding, "UTF8");
    assert!(!database.collation.is_empty());

    let names: Vec<&str> = database.schemas.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"public"));
    for system in ["information_schema", "pg_catalog", "pg_toast"] {
        assert!(!names.contains(&system), "{} is a system schema", system);
    }

    let table = table_json(&document, "test_table");
    assert_eq!(table["row_count"], 1);
    for column in table["columns"].as_array().unwrap() {
        assert_eq!(column["min_value"], column["max_value"]);
    }
    assert_eq!(table["columns"][1]["type"], "character varying(50)");
    assert_eq!(table["columns"][1]["nullable"], false);
    assert_eq!(table["columns"][1]["min_value"], "first");
    assert_eq!(table["columns"][2]["min_value"], json!(9.50));

    session
        .execute_with_params(
            "UPDATE test_table SET name = CAST($1 AS varchar) WHERE id = CAST($2 AS integer)",
            &[json!("updated"), json!(1)],
        )
        .await
        .unwrap();
    let document = profile(&session, "postgres").await.unwrap();
    assert_eq!(table_json(&document, "test_table")["columns"][1]["max_value"], "updated");

    session.execute_query("DROP TABLE test_table").await.unwrap();
    let document = profile(&session, "postgres").await.unwrap();
    assert_eq!(table_json(&document, "test_table"), Value::Null);

    session.disconnect().await;
}

#[tokio::test]
async fn test_postgres_empty_table_and_fetch() {
    let (_container, port) = start_postgres().await;
    let session = connect(&descriptor(port, "postgres", "postgres")).await.unwrap();
    session
        .execute_query("CREATE TABLE t (id INTEGER PRIMARY KEY, v VARCHAR(50))")
        .await
        .unwrap();

    let document = profile(&session, "postgres").await.unwrap();
    let table = table_json(&document, "t");
    assert_eq!(table["row_count"], 0);
    assert_eq!(table["columns"][0]["min_value"], Value::Null);
    assert_eq!(table["columns"][1]["max_value"], Value::Null);

    session
        .execute_query("INSERT INTO t VALUES (1, 'a'), (2, NULL)")
        .await
        .unwrap();
    let rows = session
        .fetch_data("SELECT id, v FROM t ORDER BY id;")
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["v"], "a");
    assert_eq!(rows[1]["v"], Value::Null);

    session.disconnect().await;
    assert!(matches!(
        session.fetch_data("SELECT 1").await,
        Err(DbProfilerError::SessionClosed)
    ));
}

/// A column MIN/MAX cannot aggregate leaves the rest of the profile intact
#[tokio::test]
async fn test_postgres_unorderable_column_is_isolated() {
    let (_container, port) = start_postgres().await;
    let session = seeded_session(port).await;
    session
        .execute_query(
            "CREATE TABLE events (id INTEGER PRIMARY KEY, payload JSON, amount NUMERIC(30,2));
             INSERT INTO events VALUES (1, '{\"a\": 1}', 1234567890123456789012345678.90), (2, '[]', 5.25);",
        )
        .await
        .unwrap();

    let document = profile(&session, "postgres").await.unwrap();

    let events = table_json(&document, "events");
    assert_eq!(events["row_count"], 2);
    assert_eq!(events["columns"][1]["name"], "payload");
    assert_eq!(events["columns"][1]["min_value"], Value::Null);
    assert_eq!(events["columns"][1]["max_value"], Value::Null);
    assert_eq!(events["columns"][0]["max_value"], 2);
    assert_eq!(events["columns"][2]["min_value"], json!(5.25));
    assert_eq!(
        events["columns"][2]["max_value"],
        json!("1234567890123456789012345678.90")
    );
    assert!(events.get("partial").is_none());
    let warnings = events["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].as_str().unwrap().contains("payload"));

    let sibling = table_json(&document, "test_table");
    assert_eq!(sibling["row_count"], 1);
    // Clean tables omit the partial flag and warnings
    assert!(sibling.get("partial").is_none());
    assert!(sibling.get("warnings").is_none());
    assert_eq!(sibling["columns"][1]["min_value"], "first");
    assert_eq!(sibling["columns"][2]["max_value"], json!(9.5));

    session.disconnect().await;
}

#[tokio::test]
async fn test_postgres_anomalies() {
    let (_container, port) = start_postgres().await;
    let session = seeded_session(port).await;

    let outlier = anomaly::definition(json!({
        "kind": "outlier_value",
        "column": "price",
        "value": 1_000_000,
        "count": 3,
    }))
    .unwrap();
    let err = anomaly::inject(&session, "test_table", &outlier).await.unwrap_err();
    // name is NOT NULL without a default
    assert!(matches!(err, DbProfilerError::QueryExecution { .. }));

    session
        .execute_query("ALTER TABLE test_table ALTER COLUMN name SET DEFAULT 'generated'")
        .await
        .unwrap();
    let handle = anomaly::inject(&session, "test_table", &outlier).await.unwrap();
    assert_eq!(handle.schema, "public");
    assert_eq!(handle.affected_rows, 3);
    assert_eq!(
        statistics::column_max(&session, "test_table", "public", "price")
            .await
            .unwrap(),
        Some(json!(1_000_000.0))
    );

    let other = connect(&descriptor(port, "postgres", "postgres")).await.unwrap();
    assert!(anomaly::verify(&other, "test_table", &outlier, &handle).await.unwrap());

    let nulls = anomaly::definition(json!({
        "kind": "null_values",
        "column": "note",
        "match_value": "ok",
    }))
    .unwrap();
    let null_handle = anomaly::inject(&other, "test_table", &nulls).await.unwrap();
    assert_eq!(null_handle.affected_rows, 1);
    // The outlier rows already carry a NULL note
    assert_eq!(null_handle.baseline_rows, 3);
    assert!(anomaly::verify(&session, "test_table", &nulls, &null_handle).await.unwrap());

    other
        .execute_query("UPDATE test_table SET note = 'ok' WHERE id = 1")
        .await
        .unwrap();
    assert!(!anomaly::verify(&session, "test_table", &nulls, &null_handle).await.unwrap());

    other
        .execute_query("DELETE FROM test_table WHERE price > 1000")
        .await
        .unwrap();
    assert!(!anomaly::verify(&session, "test_table", &outlier, &handle).await.unwrap());

    let err = anomaly::inject(
        &session,
        "test_table",
        &anomaly::definition(json!({"kind": "unknown_kind"})).unwrap(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbProfilerError::UnsupportedAnomaly { .. }));
}
