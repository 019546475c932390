//! MySQL catalog queries.
//!
//! MySQL databases and schemas are the same thing; only the database named
//! in the descriptor is profiled. `INFORMATION_SCHEMA` text columns are cast
//! to `CHAR` because some server versions report them as `VARBINARY`.

use sqlx::Row;

use super::MySqlAdapter;
use crate::Result;
use crate::adapters::helpers::introspection_error;
use crate::models::{ColumnInfo, ServerSettings};

pub(crate) const SERVER_SETTINGS_QUERY: &str = r#"
    SELECT
        CAST(DEFAULT_CHARACTER_SET_NAME AS CHAR) AS charset,
        CAST(DEFAULT_COLLATION_NAME AS CHAR) AS collation
    FROM INFORMATION_SCHEMA.SCHEMATA
    WHERE SCHEMA_NAME = DATABASE()
"#;

pub(crate) const TABLES_QUERY: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR) AS table_name
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = ?
      AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

pub(crate) const COLUMNS_QUERY: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR) AS column_name,
        CAST(COLUMN_TYPE AS CHAR) AS data_type,
        CAST(IS_NULLABLE AS CHAR) AS is_nullable,
        CAST(COLUMN_DEFAULT AS CHAR) AS column_default
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ?
      AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

pub(crate) async fn server_settings(adapter: &MySqlAdapter) -> Result<ServerSettings> {
    let row = sqlx::query(SERVER_SETTINGS_QUERY)
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| introspection_error("reading database character set and collation", e))?;

    Ok(ServerSettings {
        character_encoding: row
            .try_get("charset")
            .map_err(|e| introspection_error("decoding character set", e))?,
        collation: row
            .try_get("collation")
            .map_err(|e| introspection_error("decoding collation", e))?,
    })
}

pub(crate) async fn list_schemas(adapter: &MySqlAdapter) -> Result<Vec<String>> {
    let current: Option<String> = sqlx::query_scalar("SELECT DATABASE()")
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| introspection_error("reading current database", e))?;
    Ok(current.into_iter().collect())
}

pub(crate) async fn list_tables(adapter: &MySqlAdapter, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar(TABLES_QUERY)
        .bind(schema)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| introspection_error(format!("listing tables of schema '{}'", schema), e))
}

pub(crate) async fn list_columns(
    adapter: &MySqlAdapter,
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
        let is_nullable: String = row
            .try_get("is_nullable")
            .map_err(|e| introspection_error(context.as_str(), e))?;
        columns.push(ColumnInfo {
            name: row
                .try_get("column_name")
                .map_err(|e| introspection_error(context.as_str(), e))?,
            data_type: row
                .try_get("data_type")
                .map_err(|e| introspection_error(context.as_str(), e))?,
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
            default: row
                .try_get("column_default")
                .map_err(|e| introspection_error(context.as_str(), e))?,
        });
    }

    tracing::debug!("Found {} columns in {}.{}", columns.len(), schema, table);
    Ok(columns)
}
