//! Anomaly port: inject a described data irregularity and verify it later.
//!
//! Kinds are looked up by the definition's `kind` key in an
//! [`AnomalyRegistry`]. Injection returns an [`AnomalyHandle`] that records
//! the predicate scoping what changed; verification re-queries that
//! predicate and uses nothing but its arguments, so a handle can be stored
//! and checked later from another session or process.
//!
//! # Example
//! ```rust,no_run
//! use dbprofiler_core::{ConnectionDescriptor, anomaly, session};
//! use serde_json::json;
//!
//! # async fn run() -> dbprofiler_core::Result<()> {
//! let session = session::connect(&ConnectionDescriptor::sqlite("shop.db")).await?;
//! let definition = anomaly::definition(json!({
//!     "kind": "outlier_value",
//!     "column": "price",
//!     "value": 1_000_000,
//! }))?;
//! let handle = anomaly::inject(&session, "orders", &definition).await?;
//! assert!(anomaly::verify(&session, "orders", &definition, &handle).await?);
//! # Ok(())
//! # }
//! ```

mod kinds;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Result;
use crate::catalog::{self, ColumnRef, TableRef};
use crate::error::DbProfilerError;
use crate::models::DatabaseEngine;
use crate::session::Session;

pub use kinds::{NullValues, OutlierValue};

/// Opaque anomaly description; the `kind` key selects the implementation.
pub type AnomalyDefinition = serde_json::Map<String, Value>;

/// Builds a definition from a JSON object.
pub fn definition(value: Value) -> Result<AnomalyDefinition> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DbProfilerError::invalid_anomaly(format!(
            "definition must be a JSON object, got {}",
            other
        ))),
    }
}

/// Reads the `kind` key of a definition.
pub fn definition_kind(definition: &AnomalyDefinition) -> Result<&str> {
    definition
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| DbProfilerError::invalid_anomaly("missing string key 'kind'"))
}

/// Rows an injected anomaly is expected to be found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AnomalyPredicate {
    /// `column = value`
    Equals { column: String, value: Value },
    /// `column IS NULL`
    IsNull { column: String },
}

impl AnomalyPredicate {
    /// Column the predicate tests.
    pub fn column(&self) -> &str {
        match self {
            Self::Equals { column, .. } | Self::IsNull { column } => column,
        }
    }
}

/// Record of one injection, sufficient to verify it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyHandle {
    pub id: Uuid,
    pub kind: String,
    pub schema: String,
    pub table: String,
    pub predicate: AnomalyPredicate,
    pub affected_rows: u64,
    /// Rows already matching the predicate before the injection.
    #[serde(default)]
    pub baseline_rows: u64,
    pub injected_at: DateTime<Utc>,
}

impl AnomalyHandle {
    /// Handle for `affected_rows` rows changed just now.
    pub fn new(kind: &str, table: &TableRef, predicate: AnomalyPredicate, affected_rows: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            schema: table.schema().to_string(),
            table: table.table().to_string(),
            predicate,
            affected_rows,
            baseline_rows: 0,
            injected_at: Utc::now(),
        }
    }

    /// Records how many rows matched the predicate before the write.
    pub fn with_baseline(mut self, baseline_rows: u64) -> Self {
        self.baseline_rows = baseline_rows;
        self
    }

    /// Matching rows needed for the anomaly to count as present.
    pub fn expected_rows(&self) -> u64 {
        self.baseline_rows.saturating_add(self.affected_rows)
    }
}

/// One injectable anomaly kind.
#[async_trait]
pub trait AnomalyKind: Send + Sync {
    /// Registry key matched against the definition's `kind`.
    fn name(&self) -> &'static str;

    /// Whether the kind can run against `engine`.
    fn supports(&self, _engine: DatabaseEngine) -> bool {
        true
    }

    /// Applies the anomaly to `table`.
    async fn inject(
        &self,
        session: &Session,
        table: &TableRef,
        definition: &AnomalyDefinition,
    ) -> Result<AnomalyHandle>;

    /// Checks the anomaly recorded in `handle` is still present.
    async fn verify(
        &self,
        session: &Session,
        table: &TableRef,
        definition: &AnomalyDefinition,
        handle: &AnomalyHandle,
    ) -> Result<bool>;
}

/// Anomaly kinds keyed by name.
#[derive(Clone)]
pub struct AnomalyRegistry {
    kinds: BTreeMap<&'static str, Arc<dyn AnomalyKind>>,
}

impl Default for AnomalyRegistry {
    /// Registry holding the built-in `outlier_value` and `null_values` kinds.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(OutlierValue);
        registry.register(NullValues);
        registry
    }
}

impl std::fmt::Debug for AnomalyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnomalyRegistry")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AnomalyRegistry {
    /// Registry with no kinds.
    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Adds or replaces a kind.
    pub fn register(&mut self, kind: impl AnomalyKind + 'static) {
        self.kinds.insert(kind.name(), Arc::new(kind));
    }

    /// Registered kind names in sorted order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.kinds.keys().copied().collect()
    }

    /// Looks up a kind usable against `engine`.
    ///
    /// # Errors
    /// `UnsupportedAnomaly` if no such kind is registered for the engine.
    pub fn lookup(&self, kind: &str, engine: DatabaseEngine) -> Result<Arc<dyn AnomalyKind>> {
        self.kinds
            .get(kind)
            .filter(|k| k.supports(engine))
            .cloned()
            .ok_or_else(|| DbProfilerError::unsupported_anomaly(kind, engine))
    }

    /// Injects `definition` into `table`.
    ///
    /// `schema` falls back to the definition's `schema` key, then to the
    /// engine's default schema.
    ///
    /// # Errors
    /// `UnsupportedAnomaly` for an unknown kind, `TargetNotFound` for a
    /// missing table or column, `InvalidAnomaly` for a malformed definition.
    pub async fn inject(
        &self,
        session: &Session,
        schema: Option<&str>,
        table: &str,
        definition: &AnomalyDefinition,
    ) -> Result<AnomalyHandle> {
        let kind = self.lookup(definition_kind(definition)?, session.engine())?;
        let schema = target_schema(session, schema, definition)?;
        let table = catalog::resolve_table(session, &schema, table).await?;

        let handle = kind.inject(session, &table, definition).await?;
        info!(
            "Injected {} anomaly {} into {} ({} rows)",
            handle.kind, handle.id, table, handle.affected_rows
        );
        Ok(handle)
    }

    /// Verifies a previously injected anomaly is still present.
    ///
    /// Returns `false` once the table or column no longer exists.
    pub async fn verify(
        &self,
        session: &Session,
        table: &str,
        definition: &AnomalyDefinition,
        handle: &AnomalyHandle,
    ) -> Result<bool> {
        let kind_name = definition_kind(definition)?;
        if kind_name != handle.kind || table != handle.table {
            return Err(DbProfilerError::invalid_anomaly(format!(
                "handle {} records a {} anomaly on {}.{}, not {} on {}",
                handle.id, handle.kind, handle.schema, handle.table, kind_name, table
            )));
        }
        let kind = self.lookup(kind_name, session.engine())?;

        let table = match catalog::resolve_table(session, &handle.schema, &handle.table).await {
            Ok(table) => table,
            Err(DbProfilerError::TargetNotFound { target }) => {
                debug!("Anomaly {} target is gone: {}", handle.id, target);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let present = kind.verify(session, &table, definition, handle).await?;
        debug!("Anomaly {} present: {}", handle.id, present);
        Ok(present)
    }
}

/// Injects with the built-in registry.
pub async fn inject(
    session: &Session,
    table: &str,
    definition: &AnomalyDefinition,
) -> Result<AnomalyHandle> {
    AnomalyRegistry::default()
        .inject(session, None, table, definition)
        .await
}

/// Verifies with the built-in registry.
pub async fn verify(
    session: &Session,
    table: &str,
    definition: &AnomalyDefinition,
    handle: &AnomalyHandle,
) -> Result<bool> {
    AnomalyRegistry::default()
        .verify(session, table, definition, handle)
        .await
}

/// Schema used when neither the caller nor the definition names one.
pub fn default_schema(session: &Session) -> String {
    match session.engine() {
        DatabaseEngine::PostgreSQL => "public".to_string(),
        DatabaseEngine::MySQL => session.database_name().to_string(),
        DatabaseEngine::SQLite => "main".to_string(),
    }
}

fn target_schema(
    session: &Session,
    explicit: Option<&str>,
    definition: &AnomalyDefinition,
) -> Result<String> {
    if let Some(schema) = explicit {
        return Ok(schema.to_string());
    }
    match definition.get("schema") {
        None | Some(Value::Null) => Ok(default_schema(session)),
        Some(Value::String(schema)) => Ok(schema.clone()),
        Some(other) => Err(DbProfilerError::invalid_anomaly(format!(
            "'schema' must be a string, got {}",
            other
        ))),
    }
}

/// Counts rows of the predicate's table that match it.
pub(crate) async fn count_matching(
    session: &Session,
    column: &ColumnRef,
    predicate: &AnomalyPredicate,
) -> Result<u64> {
    let dialect = session.dialect();
    let target = dialect.qualified(column.table().schema(), column.table().table());
    let quoted = dialect.quote(column.name());

    match predicate {
        AnomalyPredicate::Equals { value, .. } => {
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {} = {}",
                target,
                quoted,
                dialect.value_placeholder(1, column.data_type())
            );
            session
                .fetch_count(&sql, std::slice::from_ref(value))
                .await
        }
        AnomalyPredicate::IsNull { .. } => {
            let sql = format!("SELECT COUNT(*) FROM {} WHERE {} IS NULL", target, quoted);
            session.fetch_count(&sql, &[]).await
        }
    }
}

/// Resolves the handle's column, `None` if it was dropped.
pub(crate) async fn handle_column(
    session: &Session,
    table: &TableRef,
    handle: &AnomalyHandle,
) -> Result<Option<ColumnRef>> {
    match catalog::resolve_column(session, table, handle.predicate.column()).await {
        Ok(column) => Ok(Some(column)),
        Err(DbProfilerError::TargetNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_requires_object_and_kind() {
        assert!(definition(json!(["outlier_value"])).is_err());

        let def = definition(json!({"column": "v"})).unwrap();
        assert!(matches!(
            definition_kind(&def),
            Err(DbProfilerError::InvalidAnomaly { .. })
        ));

        let def = definition(json!({"kind": "null_values"})).unwrap();
        assert_eq!(definition_kind(&def).unwrap(), "null_values");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = AnomalyRegistry::default();
        assert_eq!(registry.kinds(), vec!["null_values", "outlier_value"]);
        assert!(registry.lookup("outlier_value", DatabaseEngine::SQLite).is_ok());

        let err = registry
            .lookup("duplicate_rows", DatabaseEngine::PostgreSQL)
            .err()
            .unwrap();
        assert!(matches!(err, DbProfilerError::UnsupportedAnomaly { .. }));
        assert!(err.to_string().contains("PostgreSQL"));

        assert!(AnomalyRegistry::empty().kinds().is_empty());
    }

    #[test]
    fn test_handle_serialization() {
        let handle = AnomalyHandle {
            id: Uuid::nil(),
            kind: "outlier_value".to_string(),
            schema: "public".to_string(),
            table: "orders".to_string(),
            predicate: AnomalyPredicate::Equals {
                column: "price".to_string(),
                value: json!(999),
            },
            affected_rows: 2,
            baseline_rows: 1,
            injected_at: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let value = serde_json::to_value(&handle).unwrap();
        assert_eq!(value["predicate"]["op"], "equals");
        assert_eq!(value["predicate"]["column"], "price");
        assert_eq!(value["injected_at"], "2026-01-02T03:04:05Z");

        let parsed: AnomalyHandle = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, handle);
        assert_eq!(parsed.predicate.column(), "price");
        assert_eq!(parsed.expected_rows(), 3);
    }

    #[test]
    fn test_handle_without_baseline_parses() {
        let parsed: AnomalyHandle = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "kind": "null_values",
            "schema": "main",
            "table": "orders",
            "predicate": {"op": "is_null", "column": "note"},
            "affected_rows": 2,
            "injected_at": "2026-01-02T03:04:05Z",
        }))
        .unwrap();
        assert_eq!(parsed.baseline_rows, 0);
        assert_eq!(parsed.expected_rows(), 2);
    }
}
