//! Statistics collector: row counts and single-column extremes.
//!
//! String-taking entry points resolve their arguments through the catalog
//! first; the `*_of` variants take references the catalog already produced.
//! Failures that only affect one statistic surface as
//! `StatisticsUnavailable`; session-level failures pass through untouched.

use serde_json::Value;

use crate::Result;
use crate::adapters::Aggregate;
use crate::catalog::{self, ColumnRef, TableRef};
use crate::error::DbProfilerError;
use crate::session::Session;

/// Exact row count of `schema.table`.
pub async fn row_count(session: &Session, table: &str, schema: &str) -> Result<u64> {
    let table = catalog::resolve_table(session, schema, table).await?;
    row_count_of(session, &table).await
}

/// Smallest non-null value of `schema.table.column`, `None` when there is none.
pub async fn column_min(
    session: &Session,
    table: &str,
    schema: &str,
    column: &str,
) -> Result<Option<Value>> {
    let column = resolve(session, table, schema, column).await?;
    aggregate_of(session, &column, Aggregate::Min).await
}

/// Largest non-null value of `schema.table.column`, `None` when there is none.
pub async fn column_max(
    session: &Session,
    table: &str,
    schema: &str,
    column: &str,
) -> Result<Option<Value>> {
    let column = resolve(session, table, schema, column).await?;
    aggregate_of(session, &column, Aggregate::Max).await
}

async fn resolve(session: &Session, table: &str, schema: &str, column: &str) -> Result<ColumnRef> {
    let table = catalog::resolve_table(session, schema, table).await?;
    catalog::resolve_column(session, &table, column).await
}

pub async fn row_count_of(session: &Session, table: &TableRef) -> Result<u64> {
    session
        .run("row count", |adapter| {
            adapter.count_rows(table.schema(), table.table())
        })
        .await
        .map_err(|e| unavailable("row_count", table, e))
}

pub async fn aggregate_of(
    session: &Session,
    column: &ColumnRef,
    aggregate: Aggregate,
) -> Result<Option<Value>> {
    session
        .run(aggregate.label(), |adapter| {
            adapter.aggregate(
                column.table().schema(),
                column.table().table(),
                column.name(),
                aggregate,
            )
        })
        .await
        .map_err(|e| unavailable(aggregate.label(), column, e))
}

fn unavailable(statistic: &str, target: &dyn std::fmt::Display, error: DbProfilerError) -> DbProfilerError {
    if error.is_fatal() {
        error
    } else {
        DbProfilerError::statistics_unavailable(statistic, target.to_string(), error)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::{ConnectionDescriptor, session::connect};
    use serde_json::json;

    async fn seeded() -> Session {
        let session = connect(&ConnectionDescriptor::sqlite(":memory:"))
            .await
            .unwrap();
        session
            .execute_query(
                "CREATE TABLE readings (id INTEGER PRIMARY KEY, celsius REAL, label TEXT);
                 INSERT INTO readings (celsius, label) VALUES (21.5, 'b'), (-3.0, 'a'), (NULL, 'c');",
            )
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_row_count_and_extremes() {
        let session = seeded().await;
        assert_eq!(row_count(&session, "readings", "main").await.unwrap(), 3);
        assert_eq!(
            column_min(&session, "readings", "main", "celsius").await.unwrap(),
            Some(json!(-3.0))
        );
        assert_eq!(
            column_max(&session, "readings", "main", "celsius").await.unwrap(),
            Some(json!(21.5))
        );
        assert_eq!(
            column_max(&session, "readings", "main", "label").await.unwrap(),
            Some(json!("c"))
        );
    }

    #[tokio::test]
    async fn test_unknown_targets_are_rejected_before_querying() {
        let session = seeded().await;
        let err = row_count(&session, "readings; DROP TABLE readings", "main")
            .await
            .unwrap_err();
        assert!(matches!(err, DbProfilerError::TargetNotFound { .. }));

        let err = column_min(&session, "readings", "main", "kelvin")
            .await
            .unwrap_err();
        assert!(matches!(err, DbProfilerError::TargetNotFound { .. }));
        assert_eq!(row_count(&session, "readings", "main").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_failed_statistic_is_reported_as_unavailable() {
        let session = seeded().await;
        let table = catalog::resolve_table(&session, "main", "readings")
            .await
            .unwrap();
        session.execute_query("DROP TABLE readings").await.unwrap();

        let err = row_count_of(&session, &table).await.unwrap_err();
        assert!(matches!(err, DbProfilerError::StatisticsUnavailable { .. }));
        assert!(err.to_string().contains("main.readings"));
    }
}
