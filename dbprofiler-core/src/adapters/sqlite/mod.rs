//! SQLite adapter.
//!
//! Attached databases (`main`, plus anything `ATTACH`ed) play the role of
//! schemas. The `temp` database is excluded by the default catalog filter.
//!
//! # Module Structure
//! - `connection`: File and in-memory pool setup
//! - `catalog`: Pragma-based catalog queries
//! - `statistics`: Row counts, aggregates, ad-hoc queries and row decoding

mod catalog;
mod connection;
mod statistics;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

use super::{Aggregate, DatabaseAdapter};
use crate::Result;
use crate::models::{ColumnInfo, DatabaseEngine, RowMap, ServerSettings};

/// SQLite database adapter
pub struct SqliteAdapter {
    pub(crate) pool: SqlitePool,
    database: String,
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("database", &self.database)
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::SQLite
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| super::helpers::query_error("ping", e))
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    async fn server_settings(&self) -> Result<ServerSettings> {
        catalog::server_settings(self).await
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        catalog::list_schemas(self).await
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        catalog::list_tables(self, schema).await
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        catalog::list_columns(self, schema, table).await
    }

    async fn count_rows(&self, schema: &str, table: &str) -> Result<u64> {
        statistics::count_rows(self, schema, table).await
    }

    async fn aggregate(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        aggregate: Aggregate,
    ) -> Result<Option<Value>> {
        statistics::aggregate(self, schema, table, column, aggregate).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        statistics::execute(self, sql, params).await
    }

    async fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<RowMap>> {
        statistics::fetch(self, sql, params).await
    }

    async fn fetch_count(&self, sql: &str, params: &[Value]) -> Result<u64> {
        statistics::fetch_count(self, sql, params).await
    }
}
