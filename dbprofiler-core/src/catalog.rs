//! Catalog walker: schemas, tables and columns of a live session.
//!
//! System namespaces are removed here using the session's
//! [`CatalogFilter`](crate::CatalogFilter). [`TableRef`] and [`ColumnRef`]
//! can only be built from names the catalog has just returned, so every
//! identifier that reaches generated SQL originates from the database itself.

use tracing::debug;

use crate::Result;
use crate::error::DbProfilerError;
use crate::models::{ColumnInfo, ServerSettings};
use crate::session::Session;

/// A table confirmed to exist in a non-system schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    schema: String,
    table: String,
}

impl TableRef {
    /// Schema name as the catalog spells it.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Table name as the catalog spells it.
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// A column confirmed to exist on a [`TableRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    table: TableRef,
    info: ColumnInfo,
}

impl ColumnRef {
    /// Table owning this column.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Column name as the catalog spells it.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Engine-native type as reported by the catalog.
    pub fn data_type(&self) -> &str {
        &self.info.data_type
    }

    /// Full catalog entry.
    pub fn info(&self) -> &ColumnInfo {
        &self.info
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.info.name)
    }
}

/// Server encoding and collation of the connected database.
pub async fn server_settings(session: &Session) -> Result<ServerSettings> {
    session
        .run("server settings", |adapter| adapter.server_settings())
        .await
}

/// Non-system schemas in catalog order.
pub async fn list_schemas(session: &Session) -> Result<Vec<String>> {
    let schemas = session
        .run("list schemas", |adapter| adapter.list_schemas())
        .await?;
    let filter = session.catalog_filter();
    let (kept, skipped): (Vec<String>, Vec<String>) = schemas
        .into_iter()
        .partition(|schema| !filter.is_schema_excluded(schema));
    debug!(
        "Found {} schemas ({} system schemas skipped)",
        kept.len(),
        skipped.len()
    );
    Ok(kept)
}

/// Non-system base tables of `schema` in catalog order.
pub async fn list_tables(session: &Session, schema: &str) -> Result<Vec<String>> {
    let tables = session
        .run("list tables", |adapter| adapter.list_tables(schema))
        .await?;
    let filter = session.catalog_filter();
    Ok(tables
        .into_iter()
        .filter(|table| !filter.is_table_excluded(table))
        .collect())
}

/// Columns of `schema.table` by ordinal position.
///
/// # Errors
/// `TargetNotFound` when the table is not a non-system base table.
pub async fn list_columns(session: &Session, table: &str, schema: &str) -> Result<Vec<ColumnInfo>> {
    let table = resolve_table(session, schema, table).await?;
    columns_of(session, &table).await
}

/// Tables of `schema` as references usable by statistics and anomalies.
pub async fn table_refs(session: &Session, schema: &str) -> Result<Vec<TableRef>> {
    Ok(list_tables(session, schema)
        .await?
        .into_iter()
        .map(|table| TableRef {
            schema: schema.to_string(),
            table,
        })
        .collect())
}

/// Confirms `schema.table` exists and is not a system object.
pub async fn resolve_table(session: &Session, schema: &str, table: &str) -> Result<TableRef> {
    let not_found = || DbProfilerError::target_not_found(format!("table {}.{}", schema, table));

    if session.catalog_filter().is_schema_excluded(schema) {
        return Err(not_found());
    }

    table_refs(session, schema)
        .await?
        .into_iter()
        .find(|candidate| candidate.table == table)
        .ok_or_else(not_found)
}

/// Confirms `column` exists on `table`.
pub async fn resolve_column(session: &Session, table: &TableRef, column: &str) -> Result<ColumnRef> {
    columns_of(session, table)
        .await?
        .into_iter()
        .find(|info| info.name == column)
        .map(|info| ColumnRef {
            table: table.clone(),
            info,
        })
        .ok_or_else(|| DbProfilerError::target_not_found(format!("column {}.{}", table, column)))
}

/// Columns of an already resolved table.
pub async fn columns_of(session: &Session, table: &TableRef) -> Result<Vec<ColumnInfo>> {
    session
        .run("list columns", |adapter| {
            adapter.list_columns(&table.schema, &table.table)
        })
        .await
}

/// Columns of an already resolved table as references.
pub async fn column_refs(session: &Session, table: &TableRef) -> Result<Vec<ColumnRef>> {
    Ok(columns_of(session, table)
        .await?
        .into_iter()
        .map(|info| ColumnRef {
            table: table.clone(),
            info,
        })
        .collect())
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::{ConnectionDescriptor, session::connect};

    async fn seeded() -> Session {
        let session = connect(&ConnectionDescriptor::sqlite(":memory:"))
            .await
            .unwrap();
        session
            .execute_query(
                "CREATE TABLE zeta (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT NOT NULL DEFAULT 'x');
                 CREATE TABLE alpha (id INTEGER);
                 CREATE VIEW alpha_view AS SELECT id FROM alpha;",
            )
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_lists_user_tables_only() {
        let session = seeded().await;
        assert_eq!(list_schemas(&session).await.unwrap(), vec!["main"]);
        // AUTOINCREMENT creates sqlite_sequence, views are not base tables
        assert_eq!(
            list_tables(&session, "main").await.unwrap(),
            vec!["alpha", "zeta"]
        );
    }

    #[tokio::test]
    async fn test_columns_in_ordinal_order() {
        let session = seeded().await;
        let columns = list_columns(&session, "zeta", "main").await.unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "v"]);
        assert_eq!(columns[1].data_type, "TEXT");
        assert!(!columns[1].nullable);
        assert_eq!(columns[1].default.as_deref(), Some("'x'"));
    }

    #[tokio::test]
    async fn test_missing_targets() {
        let session = seeded().await;
        let err = list_columns(&session, "missing", "main").await.unwrap_err();
        assert!(matches!(err, DbProfilerError::TargetNotFound { .. }));

        let err = resolve_table(&session, "main", "sqlite_sequence")
            .await
            .unwrap_err();
        assert!(matches!(err, DbProfilerError::TargetNotFound { .. }));

        let table = resolve_table(&session, "main", "alpha").await.unwrap();
        assert_eq!(table.to_string(), "main.alpha");
        let err = resolve_column(&session, &table, "nope").await.unwrap_err();
        assert!(matches!(err, DbProfilerError::TargetNotFound { .. }));
    }
}
