//! PostgreSQL row counts, aggregates and ad-hoc queries.

use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::{Query, QueryScalar};
use sqlx::Postgres;

use super::PostgresAdapter;
use crate::adapters::Aggregate;
use crate::adapters::helpers::{BindValue, non_negative, parse_exact_json, query_error};
use crate::error::DbProfilerError;
use crate::models::RowMap;
use crate::security::Dialect;
use crate::Result;

pub(crate) fn count_sql(schema: &str, table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", Dialect::Postgres.qualified(schema, table))
}

/// `to_jsonb` hands back every scalar type as engine-agnostic JSON. It is
/// read as text so NUMERIC digits survive decoding.
pub(crate) fn aggregate_sql(schema: &str, table: &str, column: &str, aggregate: Aggregate) -> String {
    format!(
        "SELECT CAST(to_jsonb({}({})) AS text) AS value FROM {}",
        aggregate.sql_function(),
        Dialect::Postgres.quote(column),
        Dialect::Postgres.qualified(schema, table)
    )
}

/// Wraps a row-returning statement so each row arrives as one JSON object.
pub(crate) fn row_json_sql(sql: &str) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT row_to_json(q.*) AS row_data FROM ({}) q", trimmed)
}

fn bind_all<'q>(mut query: Query<'q, Postgres, PgArguments>, params: &'q [Value]) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = query.bind(BindValue::from_json(param).into_text());
    }
    query
}

fn bind_all_scalar<'q, O>(
    mut query: QueryScalar<'q, Postgres, O, PgArguments>,
    params: &'q [Value],
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    for param in params {
        query = query.bind(BindValue::from_json(param).into_text());
    }
    query
}

pub(crate) async fn count_rows(adapter: &PostgresAdapter, schema: &str, table: &str) -> Result<u64> {
    let context = format!("counting rows of '{}.{}'", schema, table);
    let count: i64 = sqlx::query_scalar(&count_sql(schema, table))
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| query_error(context.as_str(), e))?;
    non_negative(count, &context)
}

pub(crate) async fn aggregate(
    adapter: &PostgresAdapter,
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
        Some(raw) => parse_exact_json(&raw).map(Some).map_err(|e| {
            DbProfilerError::query_failed(format!("{}: invalid JSON result: {}", context, e))
        }),
    }
}

pub(crate) async fn execute(adapter: &PostgresAdapter, sql: &str, params: &[Value]) -> Result<u64> {
    let outcome = if params.is_empty() {
        sqlx::raw_sql(sql).execute(&adapter.pool).await
    } else {
        bind_all(sqlx::query(sql), params).execute(&adapter.pool).await
    };
    outcome
        .map(|done| done.rows_affected())
        .map_err(|e| query_error("executing statement", e))
}

pub(crate) async fn fetch(adapter: &PostgresAdapter, sql: &str, params: &[Value]) -> Result<Vec<RowMap>> {
    let wrapped = row_json_sql(sql);
    let rows: Vec<Value> = bind_all_scalar(sqlx::query_scalar(&wrapped), params)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| query_error("fetching rows", e))?;

    rows.into_iter()
        .map(|row| match row {
            Value::Object(map) => Ok(map),
            other => Err(DbProfilerError::query_failed(format!(
                "fetching rows: expected a JSON object per row, got {}",
                other
            ))),
        })
        .collect()
}

pub(crate) async fn fetch_count(adapter: &PostgresAdapter, sql: &str, params: &[Value]) -> Result<u64> {
    let count: i64 = bind_all_scalar(sqlx::query_scalar(sql), params)
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| query_error("fetching count", e))?;
    non_negative(count, "fetching count")
}
