//! PostgreSQL connection pool setup and connect-error classification.
//!
//! # Security Features
//! - Connect options are assembled field by field from the descriptor
//! - Session settings are applied to every pooled connection
//! - Errors carry only the descriptor's credential-free rendering

use sqlx::PgPool;
use sqlx::error::DatabaseError;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use super::PostgresAdapter;
use crate::adapters::{ConnectionConfig, helpers};
use crate::error::ConnectionErrorKind;
use crate::{ConnectionDescriptor, Result};

impl PostgresAdapter {
    /// Opens a pool against the descriptor and verifies it with `SELECT 1`.
    ///
    /// # Errors
    /// Returns a `Connection` error classified by [`classify_database_error`]
    pub async fn connect(descriptor: &ConnectionDescriptor, config: &ConnectionConfig) -> Result<Self> {
        let options = connect_options(descriptor);
        let pool = create_connection_pool(options, config)
            .await
            .map_err(|e| helpers::connect_error(descriptor, e, classify_database_error))?;

        let probe: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| helpers::connect_error(descriptor, e, classify_database_error))?;
        tracing::debug!("PostgreSQL connectivity probe returned {}", probe);

        Ok(Self {
            pool,
            database: descriptor.database().to_string(),
        })
    }
}

/// Builds connect options without ever rendering a URL.
pub(crate) fn connect_options(descriptor: &ConnectionDescriptor) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(descriptor.hostname())
        .username(descriptor.username())
        .database(descriptor.database())
        .application_name(concat!("dbprofiler-", env!("CARGO_PKG_VERSION")));

    if let Some(port) = descriptor.effective_port() {
        options = options.port(port);
    }
    if let Some(password) = descriptor.password() {
        options = options.password(password);
    }
    options
}

/// Creates a connection pool with per-connection session settings.
///
/// The pool connects eagerly so credential and host failures surface from
/// `connect` rather than from the first catalog query.
async fn create_connection_pool(
    options: PgConnectOptions,
    config: &ConnectionConfig,
) -> std::result::Result<PgPool, sqlx::Error> {
    use sqlx::Executor;

    let statement_timeout_ms = config.server_timeout_ms();
    let read_only = config.read_only;

    PgPoolOptions::new()
        .max_connections(config.max_connections.min(100))
        .min_connections(1)
        .acquire_timeout(config.connect_timeout)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if let Some(timeout_ms) = statement_timeout_ms {
                    conn.execute(format!("SET statement_timeout = {}", timeout_ms).as_str())
                        .await?;
                }

                if read_only {
                    conn.execute("SET default_transaction_read_only = on")
                        .await?;
                }

                Ok(())
            })
        })
        .connect_with(options)
        .await
}

/// Maps server-reported SQLSTATEs seen during the startup handshake.
pub(crate) fn classify_database_error(error: &dyn DatabaseError) -> Option<ConnectionErrorKind> {
    classify_sqlstate(error.code()?.as_ref())
}

pub(crate) fn classify_sqlstate(code: &str) -> Option<ConnectionErrorKind> {
    match code {
        // invalid_password, invalid_authorization_specification
        "28P01" | "28000" => Some(ConnectionErrorKind::AuthenticationFailed),
        // invalid_catalog_name
        "3D000" => Some(ConnectionErrorKind::DatabaseNotFound),
        _ => None,
    }
}
