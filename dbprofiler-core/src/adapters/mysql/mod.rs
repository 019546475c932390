//! MySQL adapter.
//!
//! # Module Structure
//! - `connection`: Pool setup and connect-error classification
//! - `catalog`: `INFORMATION_SCHEMA` queries scoped to the connected database
//! - `statistics`: Row counts, aggregates, ad-hoc queries and row decoding

mod catalog;
mod connection;
mod statistics;


use async_trait::async_trait;
use serde_json::Value;
use sqlx::MySqlPool;

use super::{Aggregate, DatabaseAdapter};
use crate::Result;
use crate::models::{ColumnInfo, DatabaseEngine, RowMap, ServerSettings};

/// MySQL database adapter with connection pooling
pub struct MySqlAdapter {
    pub(crate) pool: MySqlPool,
    database: String,
}

impl std::fmt::Debug for MySqlAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlAdapter")
            .field("database", &self.database)
            .field("pool_size", &self.pool.size())
            .field("pool_idle", &self.pool.num_idle())
            .finish()
    }
}

#[async_trait]
impl DatabaseAdapter for MySqlAdapter {
    fn engine(&self) -> DatabaseEngine {
        DatabaseEngine::MySQL
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
