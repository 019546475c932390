//! Profile assembler.
//!
//! Walks every non-system schema and table of a session in catalog order and
//! attaches row counts and per-column extremes. Failures are isolated per
//! object:
//!
//! - a failed table listing yields a schema entry with `partial: true`
//! - a failed row count or column listing yields a table entry with
//!   `partial: true`
//! - a failed MIN/MAX yields `null` and a table warning
//!
//! Fatal errors (lost connection, closed session, deadline) abort the run.

use std::time::Instant;

use futures::join;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::Result;
use crate::adapters::Aggregate;
use crate::catalog::{self, TableRef};
use crate::error::DbProfilerError;
use crate::models::{ColumnDescriptor, DatabaseProfile, ProfileDocument, SchemaDescriptor, TableDescriptor};
use crate::session::Session;
use crate::statistics;

/// Profiles the session's database and keys the result by `database_name`.
///
/// # Errors
/// Only session-level failures and failures reading the database-wide
/// catalog (encoding, schema list) are returned.
pub async fn profile(session: &Session, database_name: &str) -> Result<ProfileDocument> {
    let database = profile_database_only(session).await?;
    let mut document = ProfileDocument::new();
    document.insert(database_name, database);
    Ok(document)
}

/// Profiles the session's database, keyed by the descriptor's database name.
pub async fn profile_database(session: &Session) -> Result<ProfileDocument> {
    profile(session, session.database_name()).await
}

/// Profiles the session's database without the document wrapper.
pub async fn profile_database_only(session: &Session) -> Result<DatabaseProfile> {
    let started = Instant::now();
    info!("Profiling {} database '{}'", session.engine(), session.database_name());

    let settings = catalog::server_settings(session).await?;
    let schema_names = catalog::list_schemas(session).await?;

    let mut schemas = Vec::with_capacity(schema_names.len());
    for schema in &schema_names {
        schemas.push(profile_schema(session, schema).await?);
    }

    let profile = DatabaseProfile {
        character_encoding: settings.character_encoding,
        collation: settings.collation,
        schemas,
    };

    let summary = profile.summarize(started.elapsed());
    info!(
        "Profiled {} schemas, {} tables, {} columns in {:.2}s ({} partial tables, {} partial schemas)",
        summary.schema_count,
        summary.table_count,
        summary.column_count,
        summary.elapsed.as_secs_f64(),
        summary.partial_tables,
        summary.partial_schemas
    );
    Ok(profile)
}

async fn profile_schema(session: &Session, schema: &str) -> Result<SchemaDescriptor> {
    let mut descriptor = SchemaDescriptor::new(schema);

    let tables = match catalog::table_refs(session, schema).await {
        Ok(tables) => tables,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!("Skipping tables of schema '{}': {}", schema, e);
            descriptor.partial = true;
            descriptor.warnings.push(e.to_string());
            return Ok(descriptor);
        }
    };

    debug!("Profiling {} tables in schema '{}'", tables.len(), schema);
    for table in &tables {
        descriptor.tables.push(profile_table(session, table).await?);
    }
    Ok(descriptor)
}

async fn profile_table(session: &Session, table: &TableRef) -> Result<TableDescriptor> {
    let mut descriptor = TableDescriptor::new(table.table());

    match statistics::row_count_of(session, table).await {
        Ok(count) => descriptor.row_count = Some(count),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!("Row count unavailable for {}: {}", table, e);
            descriptor.mark_partial(e.to_string());
        }
    }

    let columns = match catalog::column_refs(session, table).await {
        Ok(columns) => columns,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!("Columns unavailable for {}: {}", table, e);
            descriptor.mark_partial(e.to_string());
            return Ok(descriptor);
        }
    };

    // Extremes of an empty table are null without asking
    let empty = descriptor.row_count == Some(0);

    for column in &columns {
        let mut entry = ColumnDescriptor::from_info(column.info().clone());
        if !empty {
            let (min, max) = join!(
                statistics::aggregate_of(session, column, Aggregate::Min),
                statistics::aggregate_of(session, column, Aggregate::Max)
            );
            entry.min_value = absorb(min, &mut descriptor.warnings)?;
            entry.max_value = absorb(max, &mut descriptor.warnings)?;
        }
        descriptor.columns.push(entry);
    }

    debug!(
        "Profiled {} ({} rows, {} columns)",
        table,
        descriptor
            .row_count
            .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
        descriptor.columns.len()
    );
    Ok(descriptor)
}

/// Turns a non-fatal statistic failure into `None` plus a warning.
fn absorb(result: Result<Option<Value>>, warnings: &mut Vec<String>) -> Result<Option<Value>> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("{}", e);
            warnings.push(e.to_string());
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_keeps_values_and_fatal_errors() {
        let mut warnings = Vec::new();
        assert_eq!(
            absorb(Ok(Some(Value::from(3))), &mut warnings).unwrap(),
            Some(Value::from(3))
        );

        let failure = DbProfilerError::statistics_unavailable("min_value", "public.t.flag", "no MIN(boolean)");
        assert_eq!(absorb(Err(failure), &mut warnings).unwrap(), None);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("public.t.flag"));

        assert!(matches!(
            absorb(Err(DbProfilerError::SessionClosed), &mut warnings),
            Err(DbProfilerError::SessionClosed)
        ));
        assert_eq!(warnings.len(), 1);
    }
}
