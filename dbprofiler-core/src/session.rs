//! Connection manager: session lifecycle.
//!
//! A [`Session`] exclusively owns one adapter and its pool. It is created by
//! [`connect`], consumed by the catalog, statistics and anomaly modules, and
//! released by [`Session::disconnect`]. After disconnect every operation
//! fails with `SessionClosed`.
//!
//! When `ConnectionConfig::query_timeout` is set every operation runs under
//! that deadline and fails with `QueryTimeout` when it elapses. Nothing here
//! retries.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{debug, info};

use crate::adapters::{CatalogFilter, ConnectionConfig, DatabaseAdapter, create_adapter};
use crate::error::{DbProfilerError, Result};
use crate::models::{DatabaseEngine, RowMap};
use crate::security::{ConnectionDescriptor, Dialect};

/// Opens a session with the default configuration.
///
/// # Errors
/// `Connection` with the failure kind, or `UnsupportedFeature` when the
/// engine was not compiled in.
pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Session> {
    connect_with_config(descriptor, &ConnectionConfig::default()).await
}

/// Opens a session with an explicit configuration.
pub async fn connect_with_config(
    descriptor: &ConnectionDescriptor,
    config: &ConnectionConfig,
) -> Result<Session> {
    info!("Connecting to {}", descriptor);
    let adapter = create_adapter(descriptor, config).await?;
    debug!("Connected to {} with {}", descriptor, config);

    Ok(Session {
        adapter,
        catalog_filter: config.catalog_filter(descriptor.engine()),
        config: config.clone(),
        database: descriptor.database().to_string(),
        target: descriptor.to_string(),
        closed: AtomicBool::new(false),
    })
}

/// Live, exclusively owned handle to one database.
pub struct Session {
    adapter: Box<dyn DatabaseAdapter>,
    catalog_filter: CatalogFilter,
    config: ConnectionConfig,
    database: String,
    target: String,
    closed: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("engine", &self.adapter.engine())
            .field("target", &self.target)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Session {
    /// Engine this session talks to.
    pub fn engine(&self) -> DatabaseEngine {
        self.adapter.engine()
    }

    /// Identifier quoting and placeholder rules for the engine.
    pub fn dialect(&self) -> Dialect {
        self.adapter.dialect()
    }

    /// Database name from the descriptor this session was opened with.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Timeouts and pool settings the session was opened with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// System schemas and tables hidden from catalog listings.
    pub fn catalog_filter(&self) -> &CatalogFilter {
        &self.catalog_filter
    }

    /// True once [`Session::disconnect`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Releases the session and its pooled connections.
    ///
    /// Idempotent: only the first call closes anything.
    pub async fn disconnect(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Session to {} already closed", self.target);
            return;
        }
        self.adapter.close().await;
        info!("Disconnected from {}", self.target);
    }

    /// Round-trips a trivial query.
    pub async fn ping(&self) -> Result<()> {
        self.run("ping", |adapter| adapter.ping()).await
    }

    /// Runs a statement (or several, without parameters) and returns the
    /// number of affected rows.
    pub async fn execute_query(&self, sql: &str) -> Result<u64> {
        self.execute_with_params(sql, &[]).await
    }

    /// Runs one parameterized statement.
    pub async fn execute_with_params(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.run("execute", |adapter| adapter.execute(sql, params)).await
    }

    /// Runs a query and returns every row as a column-ordered map.
    pub async fn fetch_data(&self, sql: &str) -> Result<Vec<RowMap>> {
        self.fetch_with_params(sql, &[]).await
    }

    /// Like [`Session::fetch_data`], with bound parameters.
    pub async fn fetch_with_params(&self, sql: &str, params: &[Value]) -> Result<Vec<RowMap>> {
        self.run("fetch", |adapter| adapter.fetch(sql, params)).await
    }

    /// Runs a query whose first column is a count.
    pub async fn fetch_count(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.run("count", |adapter| adapter.fetch_count(sql, params)).await
    }

    /// Runs `operation` against the adapter if the session is open, under
    /// the configured deadline.
    pub(crate) async fn run<'a, T, F, Fut>(&'a self, context: &str, operation: F) -> Result<T>
    where
        F: FnOnce(&'a dyn DatabaseAdapter) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.ensure_open()?;
        let pending = operation(self.adapter.as_ref());
        match self.config.query_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| DbProfilerError::query_timeout(context, limit))?,
            None => pending.await,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(DbProfilerError::SessionClosed)
        } else {
            Ok(())
        }
    }
}
