//! SQLite row counts, aggregates, ad-hoc queries and row decoding.
//!
//! SQLite is dynamically typed, so values are decoded by trying storage
//! classes in turn. BLOBs become `"base64:<data>"` strings.

use base64::Engine;
use serde_json::Value;
use sqlx::query::{Query, QueryScalar};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite};

use super::SqliteAdapter;
use crate::Result;
use crate::adapters::Aggregate;
use crate::adapters::helpers::{BindValue, non_negative, query_error};
use crate::error::DbProfilerError;
use crate::models::RowMap;
use crate::security::Dialect;

pub(crate) fn count_sql(schema: &str, table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", Dialect::Sqlite.qualified(schema, table))
}

pub(crate) fn aggregate_sql(schema: &str, table: &str, column: &str, aggregate: Aggregate) -> String {
    format!(
        "SELECT {}({}) AS value FROM {}",
        aggregate.sql_function(),
        Dialect::Sqlite.quote(column),
        Dialect::Sqlite.qualified(schema, table)
    )
}

fn bind_one<'q>(query: Query<'q, Sqlite, SqliteArguments<'q>>, value: BindValue<'q>) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        BindValue::Null => query.bind(None::<String>),
        BindValue::Bool(b) => query.bind(b),
        BindValue::Int(i) => query.bind(i),
        BindValue::Float(f) => query.bind(f),
        BindValue::Text(s) => query.bind(s.into_owned()),
    }
}

fn bind_all<'q>(mut query: Query<'q, Sqlite, SqliteArguments<'q>>, params: &'q [Value]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = bind_one(query, BindValue::from_json(param));
    }
    query
}

fn bind_all_scalar<'q, O>(
    mut query: QueryScalar<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &'q [Value],
) -> QueryScalar<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match BindValue::from_json(param) {
            BindValue::Null => query.bind(None::<String>),
            BindValue::Bool(b) => query.bind(b),
            BindValue::Int(i) => query.bind(i),
            BindValue::Float(f) => query.bind(f),
            BindValue::Text(s) => query.bind(s.into_owned()),
        };
    }
    query
}

/// Decodes column `index` of `row` into JSON.
///
/// # Errors
/// Fails when no storage class matches instead of guessing `null`.
pub(crate) fn decode_value(row: &SqliteRow, index: usize) -> Result<Value> {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.map(Value::String).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v.map(float_value).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(v
            .map(|bytes| {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                Value::String(format!("base64:{}", encoded))
            })
            .unwrap_or(Value::Null));
    }

    let name = row.columns().get(index).map_or("?", |c| c.name());
    Err(DbProfilerError::query_failed(format!(
        "column '{}' holds a value that cannot be represented as JSON",
        name
    )))
}

/// Non-finite floats have no JSON number form and are kept as text.
fn float_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

pub(crate) fn row_to_map(row: &SqliteRow) -> Result<RowMap> {
    let mut map = RowMap::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), decode_value(row, index)?);
    }
    Ok(map)
}

pub(crate) async fn count_rows(adapter: &SqliteAdapter, schema: &str, table: &str) -> Result<u64> {
    let context = format!("counting rows of '{}.{}'", schema, table);
    let count: i64 = sqlx::query_scalar(&count_sql(schema, table))
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| query_error(context.as_str(), e))?;
    non_negative(count, &context)
}

pub(crate) async fn aggregate(
    adapter: &SqliteAdapter,
    schema: &str,
    table: &str,
    column: &str,
    aggregate: Aggregate,
) -> Result<Option<Value>> {
    let context = format!(
        "computing {} of '{}.{}.{}'",
        aggregate.sql_function(),
        schema,
        table,
        column
    );
    let sql = aggregate_sql(schema, table, column, aggregate);

    let mut tx = adapter
        .pool
        .begin()
        .await
        .map_err(|e| query_error(context.as_str(), e))?;
    let fetched = sqlx::query(&sql).fetch_one(&mut *tx).await;
    if let Err(e) = tx.rollback().await {
        tracing::debug!("Rollback after {} failed: {}", context, e);
    }

    let row = fetched.map_err(|e| query_error(context.as_str(), e))?;
    match decode_value(&row, 0)? {
        Value::Null => Ok(None),
        value => Ok(Some(value)),
    }
}

pub(crate) async fn execute(adapter: &SqliteAdapter, sql: &str, params: &[Value]) -> Result<u64> {
    let outcome = if params.is_empty() {
        sqlx::raw_sql(sql).execute(&adapter.pool).await
    } else {
        bind_all(sqlx::query(sql), params).execute(&adapter.pool).await
    };
    outcome
        .map(|done| done.rows_affected())
        .map_err(|e| query_error("executing statement", e))
}

pub(crate) async fn fetch(adapter: &SqliteAdapter, sql: &str, params: &[Value]) -> Result<Vec<RowMap>> {
    let rows = bind_all(sqlx::query(sql), params)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| query_error("fetching rows", e))?;
    rows.iter().map(row_to_map).collect()
}

pub(crate) async fn fetch_count(adapter: &SqliteAdapter, sql: &str, params: &[Value]) -> Result<u64> {
    let count: i64 = bind_all_scalar(sqlx::query_scalar(sql), params)
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| query_error("fetching count", e))?;
    non_negative(count, "fetching count")
}
