//! Profile document model.
//!
//! The profile is a strict ownership tree: [`ProfileDocument`] maps a database
//! name to a [`DatabaseProfile`], which owns schemas, tables and columns in
//! catalog discovery order. Nothing here borrows from a live session.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DbProfilerError;

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseEngine {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl DatabaseEngine {
    /// Every engine this crate knows about, compiled in or not.
    pub const ALL: [Self; 3] = [Self::PostgreSQL, Self::MySQL, Self::SQLite];

    /// Scheme used in credential-free descriptor rendering.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// Default server port, `None` for file-backed engines.
    pub fn default_port(self) -> Option<u16> {
        match self {
            Self::PostgreSQL => Some(5432),
            Self::MySQL => Some(3306),
            Self::SQLite => None,
        }
    }

    /// Whether support for this engine was compiled into the crate.
    pub fn is_enabled(self) -> bool {
        match self {
            Self::PostgreSQL => cfg!(feature = "postgresql"),
            Self::MySQL => cfg!(feature = "mysql"),
            Self::SQLite => cfg!(feature = "sqlite"),
        }
    }
}

impl std::fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseEngine::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseEngine::MySQL => write!(f, "MySQL"),
            DatabaseEngine::SQLite => write!(f, "SQLite"),
        }
    }
}

impl FromStr for DatabaseEngine {
    type Err = DbProfilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::PostgreSQL),
            "mysql" => Ok(Self::MySQL),
            "sqlite" | "sqlite3" => Ok(Self::SQLite),
            other => Err(DbProfilerError::configuration(format!(
                "Unknown database engine '{}'",
                other
            ))),
        }
    }
}

/// Column as reported by the catalog, before statistics are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Engine-native type string, e.g. `character varying(50)`
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// Column entry of the profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// `null` for empty tables or when the aggregate was unavailable
    pub min_value: Option<Value>,
    pub max_value: Option<Value>,
}

impl ColumnDescriptor {
    /// Builds a descriptor from catalog data with no statistics yet.
    pub fn from_info(info: ColumnInfo) -> Self {
        Self {
            name: info.name,
            data_type: info.data_type,
            nullable: info.nullable,
            default: info.default,
            min_value: None,
            max_value: None,
        }
    }
}

/// Table entry of the profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    /// `None` only when the count itself failed
    pub row_count: Option<u64>,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            row_count: None,
            columns: Vec::new(),
            partial: false,
            warnings: Vec::new(),
        }
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Records a failure that left this entry incomplete.
    pub fn mark_partial(&mut self, warning: impl Into<String>) {
        self.partial = true;
        self.warnings.push(warning.into());
    }
}

/// Schema entry of the profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub name: String,
    pub tables: Vec<TableDescriptor>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SchemaDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            partial: false,
            warnings: Vec::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Server-level character settings of the connected database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub character_encoding: String,
    pub collation: String,
}

/// Profile of one database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseProfile {
    pub character_encoding: String,
    pub collation: String,
    pub schemas: Vec<SchemaDescriptor>,
}

impl DatabaseProfile {
    pub fn schema(&self, name: &str) -> Option<&SchemaDescriptor> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// Counts used for the completion log line.
    pub fn summarize(&self, elapsed: Duration) -> ProfileSummary {
        let tables = self.schemas.iter().flat_map(|s| s.tables.iter());
        let (mut table_count, mut column_count, mut partial_tables) = (0usize, 0usize, 0usize);
        for table in tables {
            table_count = table_count.saturating_add(1);
            column_count = column_count.saturating_add(table.columns.len());
            if table.partial {
                partial_tables = partial_tables.saturating_add(1);
            }
        }
        ProfileSummary {
            schema_count: self.schemas.len(),
            table_count,
            column_count,
            partial_tables,
            partial_schemas: self.schemas.iter().filter(|s| s.partial).count(),
            elapsed,
        }
    }
}

/// Top-level profile output: database name to profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileDocument {
    databases: BTreeMap<String, DatabaseProfile>,
}

impl ProfileDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, database: impl Into<String>, profile: DatabaseProfile) {
        self.databases.insert(database.into(), profile);
    }

    pub fn get(&self, database: &str) -> Option<&DatabaseProfile> {
        self.databases.get(database)
    }

    pub fn databases(&self) -> impl Iterator<Item = (&str, &DatabaseProfile)> {
        self.databases.iter().map(|(name, profile)| (name.as_str(), profile))
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    /// Serializes the document as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| DbProfilerError::Serialization {
            context: "profile document".to_string(),
            source,
        })
    }
}

/// Counts describing a finished profile run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    pub schema_count: usize,
    pub table_count: usize,
    pub column_count: usize,
    pub partial_tables: usize,
    pub partial_schemas: usize,
    pub elapsed: Duration,
}

/// One result row of `fetch_data`, keyed by column name in select order.
pub type RowMap = serde_json::Map<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_profile() -> DatabaseProfile {
        let mut table = TableDescriptor::new("test_table");
        table.row_count = Some(1);
        table.columns.push(ColumnDescriptor {
            name: "test_value".to_string(),
            data_type: "character varying(50)".to_string(),
            nullable: true,
            default: None,
            min_value: Some(json!("a")),
            max_value: Some(json!("a")),
        });
        let mut schema = SchemaDescriptor::new("public");
        schema.tables.push(table);
        DatabaseProfile {
            character_encoding: "UTF8".to_string(),
            collation: "en_US.UTF-8".to_string(),
            schemas: vec![schema],
        }
    }

    #[test]
    fn test_database_engine_parsing() {
        assert_eq!("postgres".parse::<DatabaseEngine>().ok(), Some(DatabaseEngine::PostgreSQL));
        assert_eq!("PostgreSQL".parse::<DatabaseEngine>().ok(), Some(DatabaseEngine::PostgreSQL));
        assert_eq!("MySQL".parse::<DatabaseEngine>().ok(), Some(DatabaseEngine::MySQL));
        assert_eq!("sqlite3".parse::<DatabaseEngine>().ok(), Some(DatabaseEngine::SQLite));
        assert!("oracle".parse::<DatabaseEngine>().is_err());
    }

    #[test]
    fn test_database_engine_display() {
        assert_eq!(DatabaseEngine::PostgreSQL.to_string(), "PostgreSQL");
        assert_eq!(DatabaseEngine::MySQL.to_string(), "MySQL");
        assert_eq!(DatabaseEngine::SQLite.to_string(), "SQLite");
    }

    #[test]
    fn test_document_shape() {
        let mut document = ProfileDocument::new();
        document.insert("inventory", sample_profile());

        let value = serde_json::to_value(&document).unwrap();
        let db = &value["inventory"];
        assert_eq!(db["character_encoding"], "UTF8");
        let table = &db["schemas"][0]["tables"][0];
        assert_eq!(table["name"], "test_table");
        assert_eq!(table["row_count"], 1);
        assert!(table.get("partial").is_none());
        assert!(table.get("warnings").is_none());

        let column = &table["columns"][0];
        assert_eq!(column["type"], "character varying(50)");
        assert_eq!(column["default"], Value::Null);
        assert_eq!(column["min_value"], "a");
    }

    #[test]
    fn test_partial_markers_serialized() {
        let mut table = TableDescriptor::new("broken");
        table.mark_partial("columns: permission denied");

        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["partial"], true);
        assert_eq!(value["row_count"], Value::Null);
        assert_eq!(value["warnings"][0], "columns: permission denied");
    }

    #[test]
    fn test_summary_counts() {
        let mut profile = sample_profile();
        let mut broken = TableDescriptor::new("broken");
        broken.mark_partial("count failed");
        profile.schemas[0].tables.push(broken);

        let summary = profile.summarize(Duration::from_millis(12));
        assert_eq!(summary.schema_count, 1);
        assert_eq!(summary.table_count, 2);
        assert_eq!(summary.column_count, 1);
        assert_eq!(summary.partial_tables, 1);
        assert_eq!(summary.partial_schemas, 0);
    }
}
