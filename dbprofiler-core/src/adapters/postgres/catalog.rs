//! PostgreSQL catalog queries.
//!
//! Structure comes from `pg_catalog` rather than `information_schema` so
//! that tables the session cannot read are still reported; their statistics
//! then fail individually.

use sqlx::Row;

use super::PostgresAdapter;
use crate::Result;
use crate::adapters::helpers::introspection_error;
use crate::models::{ColumnInfo, ServerSettings};

pub(crate) const SERVER_SETTINGS_QUERY: &str = r#"
    SELECT
        current_setting('server_encoding') AS encoding,
        d.datcollate::text AS collation
    FROM pg_database d
    WHERE d.datname = current_database()
"#;

pub(crate) const SCHEMAS_QUERY: &str = r#"
    SELECT n.nspname::text AS schema_name
    FROM pg_namespace n
    ORDER BY n.nspname
"#;

pub(crate) const TABLES_QUERY: &str = r#"
    SELECT c.relname::text AS table_name
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
      AND c.relkind IN ('r', 'p')
    ORDER BY c.relname
"#;

pub(crate) const COLUMNS_QUERY: &str = r#"
    SELECT
        a.attname::text AS column_name,
        format_type(a.atttypid, a.atttypmod) AS data_type,
        NOT a.attnotnull AS is_nullable,
        pg_get_expr(d.adbin, d.adrelid) AS column_default
    FROM pg_attribute a
    JOIN pg_class c ON c.oid = a.attrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
    WHERE n.nspname = $1
      AND c.relname = $2
      AND a.attnum > 0
      AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

pub(crate) async fn server_settings(adapter: &PostgresAdapter) -> Result<ServerSettings> {
    let row = sqlx::query(SERVER_SETTINGS_QUERY)
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| introspection_error("reading server encoding and collation", e))?;

    let character_encoding: String = row
        .try_get("encoding")
        .map_err(|e| introspection_error("decoding server encoding", e))?;
    let collation: String = row
        .try_get("collation")
        .map_err(|e| introspection_error("decoding database collation", e))?;

    Ok(ServerSettings {
        character_encoding,
        collation,
    })
}

pub(crate) async fn list_schemas(adapter: &PostgresAdapter) -> Result<Vec<String>> {
    sqlx::query_scalar(SCHEMAS_QUERY)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| introspection_error("listing schemas", e))
}

pub(crate) async fn list_tables(adapter: &PostgresAdapter, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar(TABLES_QUERY)
        .bind(schema)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| introspection_error(format!("listing tables of schema '{}'", schema), e))
}

pub(crate) async fn list_columns(
    adapter: &PostgresAdapter,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let context = format!("listing columns of '{}.{}'", schema, table);
    let rows = sqlx::query(COLUMNS_QUERY)
        .bind(schema)
        .bind(table)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| introspection_error(context.as_str(), e))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        columns.push(ColumnInfo {
            name: row
                .try_get("column_name")
                .map_err(|e| introspection_error(context.as_str(), e))?,
            data_type: row
                .try_get("data_type")
                .map_err(|e| introspection_error(context.as_str(), e))?,
            nullable: row
                .try_get("is_nullable")
                .map_err(|e| introspection_error(context.as_str(), e))?,
            default: row
                .try_get("column_default")
                .map_err(|e| introspection_error(context.as_str(), e))?,
        });
    }

    tracing::debug!("Found {} columns in {}.{}", columns.len(), schema, table);
    Ok(columns)
}
