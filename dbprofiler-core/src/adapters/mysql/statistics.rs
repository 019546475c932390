//! MySQL row counts, aggregates, ad-hoc queries and row decoding.

use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::{Query, QueryScalar};
use sqlx::{Column, MySql, Row, TypeInfo};

use super::MySqlAdapter;
use crate::Result;
use crate::adapters::Aggregate;
use crate::adapters::helpers::{BindValue, non_negative, parse_exact_json, query_error};
use crate::error::DbProfilerError;
use crate::models::RowMap;
use crate::security::Dialect;

pub(crate) fn count_sql(schema: &str, table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", Dialect::MySql.qualified(schema, table))
}

/// `JSON_ARRAY` renders any scalar, including DECIMAL and temporal types,
/// as JSON. It is read as text so DECIMAL digits survive, and the single
/// element is unwrapped after decoding.
pub(crate) fn aggregate_sql(schema: &str, table: &str, column: &str, aggregate: Aggregate) -> String {
    format!(
        "SELECT CAST(JSON_ARRAY({}({})) AS CHAR) AS value FROM {}",
        aggregate.sql_function(),
        Dialect::MySql.quote(column),
        Dialect::MySql.qualified(schema, table)
    )
}

/// Element of a one-element JSON array in text form; `None` for `[null]`.
pub(crate) fn unwrap_json_array(raw: &str) -> serde_json::Result<Option<Value>> {
    let inner = raw
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(raw);
    if inner.trim().is_empty() {
        return Ok(None);
    }
    Ok(match parse_exact_json(inner)? {
        Value::Null => None,
        value => Some(value),
    })
}

fn bind_all<'q>(mut query: Query<'q, MySql, MySqlArguments>, params: &'q [Value]) -> Query<'q, MySql, MySqlArguments> {
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

fn bind_all_scalar<'q, O>(
    mut query: QueryScalar<'q, MySql, O, MySqlArguments>,
    params: &'q [Value],
) -> QueryScalar<'q, MySql, O, MySqlArguments> {
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

/// Decodes column `index` of `row` into JSON, trying likely types in turn.
pub(crate) fn decode_value(row: &MySqlRow, index: usize) -> Result<Value> {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.map(Value::String).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<rust_decimal::Decimal>, _>(index) {
        return Ok(v.map(|d| decimal_json(&d.to_string())).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return Ok(v.map(|n| Value::Number(n.into())).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<Value>, _>(index) {
        return Ok(v.unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return Ok(v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return Ok(v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(index) {
        return Ok(v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(v
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null));
    }

    let (name, type_name) = row
        .columns()
        .get(index)
        .map_or(("?", "?"), |c| (c.name(), c.type_info().name()));
    Err(DbProfilerError::query_failed(format!(
        "column '{}' of type {} cannot be represented as JSON",
        name, type_name
    )))
}

/// DECIMAL as a JSON number when `f64` holds it exactly, else its digits.
pub(crate) fn decimal_json(digits: &str) -> Value {
    parse_exact_json(digits).unwrap_or_else(|_| Value::String(digits.to_string()))
}

pub(crate) fn row_to_map(row: &MySqlRow) -> Result<RowMap> {
    let mut map = RowMap::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), decode_value(row, index)?);
    }
    Ok(map)
}

pub(crate) async fn count_rows(adapter: &MySqlAdapter, schema: &str, table: &str) -> Result<u64> {
    let context = format!("counting rows of '{}.{}'", schema, table);
    let count: i64 = sqlx::query_scalar(&count_sql(schema, table))
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| query_error(context.as_str(), e))?;
    non_negative(count, &context)
}

pub(crate) async fn aggregate(
    adapter: &MySqlAdapter,
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
    let result: std::result::Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar(&sql).fetch_one(&mut *tx).await;
    if let Err(e) = tx.rollback().await {
        tracing::debug!("Rollback after {} failed: {}", context, e);
    }

    match result.map_err(|e| query_error(context.as_str(), e))? {
        None => Ok(None),
        Some(raw) => unwrap_json_array(&raw).map_err(|e| {
            DbProfilerError::query_failed(format!("{}: invalid JSON result: {}", context, e))
        }),
    }
}

pub(crate) async fn execute(adapter: &MySqlAdapter, sql: &str, params: &[Value]) -> Result<u64> {
    let outcome = if params.is_empty() {
        sqlx::raw_sql(sql).execute(&adapter.pool).await
    } else {
        bind_all(sqlx::query(sql), params).execute(&adapter.pool).await
    };
    outcome
        .map(|done| done.rows_affected())
        .map_err(|e| query_error("executing statement", e))
}

pub(crate) async fn fetch(adapter: &MySqlAdapter, sql: &str, params: &[Value]) -> Result<Vec<RowMap>> {
    let rows = bind_all(sqlx::query(sql), params)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| query_error("fetching rows", e))?;
    rows.iter().map(row_to_map).collect()
}

pub(crate) async fn fetch_count(adapter: &MySqlAdapter, sql: &str, params: &[Value]) -> Result<u64> {
    let count: i64 = bind_all_scalar(sqlx::query_scalar(sql), params)
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| query_error("fetching count", e))?;
    non_negative(count, "fetching count")
}
