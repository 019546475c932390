//! Built-in anomaly kinds.

use async_trait::async_trait;
use serde_json::Value;

use super::{
    AnomalyDefinition, AnomalyHandle, AnomalyKind, AnomalyPredicate, count_matching,
    handle_column,
};
use crate::Result;
use crate::catalog::{self, TableRef};
use crate::error::DbProfilerError;
use crate::session::Session;

/// Upper bound on rows a single `outlier_value` injection may insert.
pub const MAX_OUTLIER_ROWS: u64 = 500;

fn required_str<'a>(definition: &'a AnomalyDefinition, key: &str) -> Result<&'a str> {
    match definition.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(other) => Err(DbProfilerError::invalid_anomaly(format!(
            "'{}' must be a non-empty string, got {}",
            key, other
        ))),
        None => Err(DbProfilerError::invalid_anomaly(format!(
            "missing key '{}'",
            key
        ))),
    }
}

fn required_value<'a>(definition: &'a AnomalyDefinition, key: &str) -> Result<&'a Value> {
    match definition.get(key) {
        Some(Value::Null) | None => Err(DbProfilerError::invalid_anomaly(format!(
            "'{}' must be a non-null scalar",
            key
        ))),
        Some(Value::Array(_) | Value::Object(_)) => Err(DbProfilerError::invalid_anomaly(
            format!("'{}' must be a scalar", key),
        )),
        Some(value) => Ok(value),
    }
}

fn row_count(definition: &AnomalyDefinition) -> Result<u64> {
    let count = match definition.get("count") {
        None => 1,
        Some(value) => value.as_u64().ok_or_else(|| {
            DbProfilerError::invalid_anomaly(format!("'count' must be a positive integer, got {}", value))
        })?,
    };
    if count == 0 || count > MAX_OUTLIER_ROWS {
        return Err(DbProfilerError::invalid_anomaly(format!(
            "'count' must be between 1 and {}, got {}",
            MAX_OUTLIER_ROWS, count
        )));
    }
    Ok(count)
}

/// The handle must describe the column the definition names.
fn check_column(definition: &AnomalyDefinition, handle: &AnomalyHandle) -> Result<()> {
    let column = required_str(definition, "column")?;
    if column != handle.predicate.column() {
        return Err(DbProfilerError::invalid_anomaly(format!(
            "handle {} targets column '{}', definition names '{}'",
            handle.id,
            handle.predicate.column(),
            column
        )));
    }
    Ok(())
}

async fn verify_at_least(
    session: &Session,
    table: &TableRef,
    handle: &AnomalyHandle,
) -> Result<bool> {
    let Some(column) = handle_column(session, table, handle).await? else {
        return Ok(false);
    };
    let matching = count_matching(session, &column, &handle.predicate).await?;
    Ok(matching >= handle.expected_rows())
}

/// Inserts `count` rows carrying an out-of-range `value` in `column`.
///
/// Definition keys: `column`, `value`, optional `count` (default 1). Other
/// columns take their defaults, so they must be nullable or have one.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlierValue;

#[async_trait]
impl AnomalyKind for OutlierValue {
    fn name(&self) -> &'static str {
        "outlier_value"
    }

    async fn inject(
        &self,
        session: &Session,
        table: &TableRef,
        definition: &AnomalyDefinition,
    ) -> Result<AnomalyHandle> {
        let column_name = required_str(definition, "column")?;
        let value = required_value(definition, "value")?;
        let count = row_count(definition)?;
        let column = catalog::resolve_column(session, table, column_name).await?;

        let predicate = AnomalyPredicate::Equals {
            column: column.name().to_string(),
            value: value.clone(),
        };
        let baseline = count_matching(session, &column, &predicate).await?;

        let dialect = session.dialect();
        let rows: Vec<String> = (1..=count as usize)
            .map(|i| format!("({})", dialect.value_placeholder(i, column.data_type())))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            dialect.qualified(table.schema(), table.table()),
            dialect.quote(column.name()),
            rows.join(", ")
        );
        let params = vec![value.clone(); count as usize];

        let inserted = session.execute_with_params(&sql, &params).await?;
        Ok(AnomalyHandle::new(self.name(), table, predicate, inserted).with_baseline(baseline))
    }

    async fn verify(
        &self,
        session: &Session,
        table: &TableRef,
        definition: &AnomalyDefinition,
        handle: &AnomalyHandle,
    ) -> Result<bool> {
        check_column(definition, handle)?;
        if !matches!(handle.predicate, AnomalyPredicate::Equals { .. }) {
            return Err(DbProfilerError::invalid_anomaly(format!(
                "handle {} has no value predicate",
                handle.id
            )));
        }
        verify_at_least(session, table, handle).await
    }
}

/// Sets `column` to NULL on every row where it equals `match_value`.
///
/// Definition keys: `column`, `match_value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullValues;

#[async_trait]
impl AnomalyKind for NullValues {
    fn name(&self) -> &'static str {
        "null_values"
    }

    async fn inject(
        &self,
        session: &Session,
        table: &TableRef,
        definition: &AnomalyDefinition,
    ) -> Result<AnomalyHandle> {
        let column_name = required_str(definition, "column")?;
        let match_value = required_value(definition, "match_value")?;
        let column = catalog::resolve_column(session, table, column_name).await?;
        if !column.info().nullable {
            return Err(DbProfilerError::invalid_anomaly(format!(
                "column {} is NOT NULL",
                column
            )));
        }

        let predicate = AnomalyPredicate::IsNull {
            column: column.name().to_string(),
        };
        let baseline = count_matching(session, &column, &predicate).await?;

        let dialect = session.dialect();
        let quoted = dialect.quote(column.name());
        let sql = format!(
            "UPDATE {} SET {} = NULL WHERE {} = {}",
            dialect.qualified(table.schema(), table.table()),
            quoted,
            quoted,
            dialect.value_placeholder(1, column.data_type())
        );

        let updated = session
            .execute_with_params(&sql, std::slice::from_ref(match_value))
            .await?;
        if updated == 0 {
            return Err(DbProfilerError::invalid_anomaly(format!(
                "no row of {} has {} = {}",
                table,
                column.name(),
                match_value
            )));
        }

        Ok(AnomalyHandle::new(self.name(), table, predicate, updated).with_baseline(baseline))
    }

    async fn verify(
        &self,
        session: &Session,
        table: &TableRef,
        definition: &AnomalyDefinition,
        handle: &AnomalyHandle,
    ) -> Result<bool> {
        check_column(definition, handle)?;
        if !matches!(handle.predicate, AnomalyPredicate::IsNull { .. }) {
            return Err(DbProfilerError::invalid_anomaly(format!(
                "handle {} has no null predicate",
                handle.id
            )));
        }
        verify_at_least(session, table, handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(value: Value) -> AnomalyDefinition {
        crate::anomaly::definition(value).unwrap()
    }

    #[test]
    fn test_required_keys() {
        let d = def(json!({"kind": "outlier_value", "column": "", "value": [1]}));
        assert!(required_str(&d, "column").is_err());
        assert!(required_value(&d, "value").is_err());
        assert!(required_value(&d, "match_value").is_err());

        let d = def(json!({"column": "price", "value": 1.5}));
        assert_eq!(required_str(&d, "column").unwrap(), "price");
        assert_eq!(required_value(&d, "value").unwrap(), &json!(1.5));
    }

    #[test]
    fn test_row_count_bounds() {
        assert_eq!(row_count(&def(json!({}))).unwrap(), 1);
        assert_eq!(row_count(&def(json!({"count": 3}))).unwrap(), 3);
        assert!(row_count(&def(json!({"count": 0}))).is_err());
        assert!(row_count(&def(json!({"count": -2}))).is_err());
        assert!(row_count(&def(json!({"count": MAX_OUTLIER_ROWS + 1}))).is_err());
    }
}
