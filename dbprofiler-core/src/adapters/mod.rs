//! Database adapter trait and factory for engine-agnostic access.
//!
//! Each engine has exactly one adapter. Adapters are thin: they run
//! engine-specific catalog and aggregate queries and decode rows into the
//! shared model. Filtering, identifier validation, deadlines and partial
//! failure handling live above them in the session, catalog and profile
//! modules.
//!
//! # Module Structure
//! - `config`: Configuration types (ConnectionConfig, CatalogFilter)
//! - `helpers`: Shared sqlx error mapping and value binding
//! - Database-specific modules (postgres, mysql, sqlite)

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    ConnectionDescriptor, Result,
    models::{ColumnInfo, DatabaseEngine, RowMap, ServerSettings},
    security::Dialect,
};

pub mod config;

#[cfg(any(feature = "postgresql", feature = "mysql", feature = "sqlite"))]
pub(crate) mod helpers;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgresql")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{CatalogFilter, ConnectionConfig};

/// Single-column aggregate computed by the statistics collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Min,
    Max,
}

impl Aggregate {
    pub fn sql_function(self) -> &'static str {
        match self {
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Min => "min_value",
            Self::Max => "max_value",
        }
    }
}

/// Engine adapter with object-safe design.
///
/// Identifiers passed to the `schema`/`table`/`column` parameters have
/// already been resolved against the catalog by the caller; adapters quote
/// them but never validate them. Values are always bound.
///
/// # Object Safety
/// Sessions hold adapters as `Box<dyn DatabaseAdapter>`.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Returns the engine this adapter handles.
    fn engine(&self) -> DatabaseEngine;

    /// Quoting and placeholder rules for SQL built against this adapter.
    fn dialect(&self) -> Dialect {
        Dialect::for_engine(self.engine())
    }

    /// Round-trips a trivial query.
    async fn ping(&self) -> Result<()>;

    /// Closes the underlying pool. Later calls fail with `SessionClosed`.
    async fn close(&self);

    /// Server encoding and collation of the connected database.
    async fn server_settings(&self) -> Result<ServerSettings>;

    /// Every schema visible to the session, unfiltered, in catalog order.
    async fn list_schemas(&self) -> Result<Vec<String>>;

    /// Base tables of `schema`, unfiltered, in catalog order.
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>>;

    /// Columns of `schema.table` by ordinal position.
    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>>;

    /// `SELECT COUNT(*)` over the whole table.
    async fn count_rows(&self, schema: &str, table: &str) -> Result<u64>;

    /// MIN or MAX of one column in its own rolled-back transaction.
    ///
    /// Returns `None` when the table is empty or every value is NULL.
    async fn aggregate(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        aggregate: Aggregate,
    ) -> Result<Option<Value>>;

    /// Runs a statement and returns the affected row count.
    ///
    /// With no parameters the SQL may hold several statements. PostgreSQL
    /// binds every parameter as text, so SQL must wrap placeholders with
    /// [`Dialect::value_placeholder`].
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Runs a query and converts every row into a column-ordered map.
    async fn fetch(&self, sql: &str, params: &[Value]) -> Result<Vec<RowMap>>;

    /// Runs a query whose first column is a count.
    async fn fetch_count(&self, sql: &str, params: &[Value]) -> Result<u64>;
}

/// Creates the adapter for `descriptor.engine()` and verifies the connection.
///
/// # Security
/// - Connect options are set field by field; no password-bearing URL exists
/// - Errors carry the descriptor's credential-free rendering only
///
/// # Errors
/// Returns `Connection` errors classified by kind, or `UnsupportedFeature`
/// when the engine was not compiled in.
pub async fn create_adapter(
    descriptor: &ConnectionDescriptor,
    config: &ConnectionConfig,
) -> Result<Box<dyn DatabaseAdapter>> {
    config.validate()?;

    match descriptor.engine() {
        #[cfg(feature = "postgresql")]
        DatabaseEngine::PostgreSQL => {
            let adapter = postgres::PostgresAdapter::connect(descriptor, config).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "postgresql"))]
        DatabaseEngine::PostgreSQL => Err(crate::error::DbProfilerError::unsupported_feature(
            "PostgreSQL adapter",
            "Compile with --features postgresql to enable PostgreSQL support",
        )),
        #[cfg(feature = "mysql")]
        DatabaseEngine::MySQL => {
            let adapter = mysql::MySqlAdapter::connect(descriptor, config).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "mysql"))]
        DatabaseEngine::MySQL => Err(crate::error::DbProfilerError::unsupported_feature(
            "MySQL adapter",
            "Compile with --features mysql to enable MySQL support",
        )),
        #[cfg(feature = "sqlite")]
        DatabaseEngine::SQLite => {
            let adapter = sqlite::SqliteAdapter::connect(descriptor, config).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseEngine::SQLite => Err(crate::error::DbProfilerError::unsupported_feature(
            "SQLite adapter",
            "Compile with --features sqlite to enable SQLite support",
        )),
    }
}

/// Engines compiled into this build.
pub fn enabled_engines() -> Vec<DatabaseEngine> {
    DatabaseEngine::ALL
        .into_iter()
        .filter(|engine| engine.is_enabled())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_labels() {
        assert_eq!(Aggregate::Min.sql_function(), "MIN");
        assert_eq!(Aggregate::Max.label(), "max_value");
    }

    #[test]
    fn test_default_features_enabled() {
        let engines = enabled_engines();
        #[cfg(feature = "sqlite")]
        assert!(engines.contains(&DatabaseEngine::SQLite));
        #[cfg(feature = "postgresql")]
        assert!(engines.contains(&DatabaseEngine::PostgreSQL));
        #[cfg(not(feature = "mysql"))]
        assert!(!engines.contains(&DatabaseEngine::MySQL));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_connecting() {
        let descriptor = ConnectionDescriptor::sqlite(":memory:");
        let config = ConnectionConfig::new().with_max_connections(0);
        let result = create_adapter(&descriptor, &config).await;
        assert!(matches!(
            result,
            Err(crate::error::DbProfilerError::Configuration { .. })
        ));
    }
}
