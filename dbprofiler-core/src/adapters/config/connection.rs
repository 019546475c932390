//! Session configuration.
//!
//! Credentials live in [`ConnectionDescriptor`](crate::ConnectionDescriptor);
//! this struct only carries tunables and is safe to log or serialize.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::CatalogFilter;
use crate::models::DatabaseEngine;

/// Extra time the server allows a statement beyond the client deadline.
const SERVER_TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

/// Configuration for a profiling session.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use dbprofiler_core::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_query_timeout(Duration::from_secs(60))
///     .with_max_connections(4);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Bound on connection establishment
    pub connect_timeout: Duration,
    /// Deadline for every session operation; `None` leaves engine defaults
    pub query_timeout: Option<Duration>,
    /// Maximum number of pooled connections behind the session
    pub max_connections: u32,
    /// Open the session read-only where the engine supports it
    pub read_only: bool,
    /// Catalog denylist; `None` uses the engine defaults
    pub catalog: Option<CatalogFilter>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            query_timeout: None,
            max_connections: 5,
            read_only: false,
            catalog: None,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig(connect_timeout={}s, query_timeout={}, max_connections={}{})",
            self.connect_timeout.as_secs(),
            self.query_timeout
                .map_or_else(|| "none".to_string(), |t| format!("{}s", t.as_secs())),
            self.max_connections,
            if self.read_only { ", read_only" } else { "" }
        )
    }
}

impl ConnectionConfig {
    /// Creates a config with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates configuration parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_connections == 0 {
            return Err(crate::error::DbProfilerError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(crate::error::DbProfilerError::configuration(
                "max_connections should not exceed 100 for safety",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(crate::error::DbProfilerError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.is_some_and(|t| t.is_zero()) {
            return Err(crate::error::DbProfilerError::configuration(
                "query_timeout must be greater than 0 when set",
            ));
        }

        Ok(())
    }

    /// Server-side statement limit in milliseconds.
    ///
    /// Sits past the client deadline so an overrunning query surfaces as
    /// `QueryTimeout` from the session rather than a server cancellation.
    pub fn server_timeout_ms(&self) -> Option<u128> {
        self.query_timeout
            .map(|t| t.saturating_add(SERVER_TIMEOUT_MARGIN).as_millis())
    }

    /// Catalog filter to apply for `engine`.
    pub fn catalog_filter(&self, engine: DatabaseEngine) -> CatalogFilter {
        self.catalog
            .clone()
            .unwrap_or_else(|| CatalogFilter::for_engine(engine))
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder method to set the per-operation deadline.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Builder method to set the pool size.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Builder method to request a read-only session.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Builder method to replace the catalog denylist.
    pub fn with_catalog_filter(mut self, filter: CatalogFilter) -> Self {
        self.catalog = Some(filter);
        self
    }
}
