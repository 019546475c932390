//! System-namespace denylists.

use serde::{Deserialize, Serialize};

use crate::models::DatabaseEngine;

/// Schemas and tables the catalog walker never reports.
///
/// Schema names match case-insensitively; prefixes match as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    /// Exact schema names to skip
    pub excluded_schemas: Vec<String>,
    /// Schema name prefixes to skip
    pub excluded_schema_prefixes: Vec<String>,
    /// Table name prefixes to skip
    pub excluded_table_prefixes: Vec<String>,
}

impl CatalogFilter {
    /// Default denylist for an engine's system catalogs.
    pub fn for_engine(engine: DatabaseEngine) -> Self {
        match engine {
            DatabaseEngine::PostgreSQL => Self {
                excluded_schemas: strings(&["information_schema", "pg_catalog", "pg_toast"]),
                excluded_schema_prefixes: strings(&["pg_temp_", "pg_toast_temp_"]),
                excluded_table_prefixes: strings(&["pg_"]),
            },
            DatabaseEngine::MySQL => Self {
                excluded_schemas: strings(&[
                    "information_schema",
                    "mysql",
                    "performance_schema",
                    "sys",
                ]),
                excluded_schema_prefixes: Vec::new(),
                excluded_table_prefixes: Vec::new(),
            },
            DatabaseEngine::SQLite => Self {
                excluded_schemas: strings(&["temp"]),
                excluded_schema_prefixes: Vec::new(),
                excluded_table_prefixes: strings(&["sqlite_"]),
            },
        }
    }

    /// Adds an exact schema name to the denylist.
    pub fn exclude_schema(mut self, schema: impl Into<String>) -> Self {
        self.excluded_schemas.push(schema.into());
        self
    }

    /// Adds a table name prefix to the denylist.
    pub fn exclude_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.excluded_table_prefixes.push(prefix.into());
        self
    }

    pub fn is_schema_excluded(&self, schema: &str) -> bool {
        self.excluded_schemas
            .iter()
            .any(|s| s.eq_ignore_ascii_case(schema))
            || self
                .excluded_schema_prefixes
                .iter()
                .any(|p| schema.starts_with(p.as_str()))
    }

    pub fn is_table_excluded(&self, table: &str) -> bool {
        self.excluded_table_prefixes
            .iter()
            .any(|p| table.starts_with(p.as_str()))
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
