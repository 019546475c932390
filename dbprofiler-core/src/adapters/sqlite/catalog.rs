//! SQLite catalog queries via table-valued pragmas.

use sqlx::Row;

use super::SqliteAdapter;
use crate::Result;
use crate::adapters::helpers::introspection_error;
use crate::models::{ColumnInfo, ServerSettings};
use crate::security::Dialect;

/// SQLite compares text with the built-in `BINARY` collation unless a
/// column declares otherwise.
pub(crate) const DEFAULT_COLLATION: &str = "BINARY";

pub(crate) const SCHEMAS_QUERY: &str = "SELECT name FROM pragma_database_list ORDER BY seq";

pub(crate) const COLUMNS_QUERY: &str = r#"
    SELECT name, type, "notnull", dflt_value
    FROM pragma_table_info(?1, ?2)
    ORDER BY cid
"#;

pub(crate) fn tables_sql(schema: &str) -> String {
    format!(
        "SELECT name FROM {}.sqlite_master WHERE type = 'table' ORDER BY name",
        Dialect::Sqlite.quote(schema)
    )
}

pub(crate) async fn server_settings(adapter: &SqliteAdapter) -> Result<ServerSettings> {
    let character_encoding: String = sqlx::query_scalar("PRAGMA encoding")
        .fetch_one(&adapter.pool)
        .await
        .map_err(|e| introspection_error("reading database encoding", e))?;

    Ok(ServerSettings {
        character_encoding,
        collation: DEFAULT_COLLATION.to_string(),
    })
}

pub(crate) async fn list_schemas(adapter: &SqliteAdapter) -> Result<Vec<String>> {
    sqlx::query_scalar(SCHEMAS_QUERY)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| introspection_error("listing attached databases", e))
}

pub(crate) async fn list_tables(adapter: &SqliteAdapter, schema: &str) -> Result<Vec<String>> {
    sqlx::query_scalar(&tables_sql(schema))
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| introspection_error(format!("listing tables of schema '{}'", schema), e))
}

pub(crate) async fn list_columns(
    adapter: &SqliteAdapter,
    schema: &str,
    table: &str,
) -> Result<Vec<ColumnInfo>> {
    let context = format!("listing columns of '{}.{}'", schema, table);
    let rows = sqlx::query(COLUMNS_QUERY)
        .bind(table)
        .bind(schema)
        .fetch_all(&adapter.pool)
        .await
        .map_err(|e| introspection_error(context.as_str(), e))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let not_null: i64 = row
            .try_get("notnull")
            .map_err(|e| introspection_error(context.as_str(), e))?;
        columns.push(ColumnInfo {
            name: row
                .try_get("name")
                .map_err(|e| introspection_error(context.as_str(), e))?,
            data_type: row
                .try_get("type")
                .map_err(|e| introspection_error(context.as_str(), e))?,
            nullable: not_null == 0,
            default: row
                .try_get("dflt_value")
                .map_err(|e| introspection_error(context.as_str(), e))?,
        });
    }

    tracing::debug!("Found {} columns in {}.{}", columns.len(), schema, table);
    Ok(columns)
}
