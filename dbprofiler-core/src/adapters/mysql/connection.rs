//! MySQL connection pool setup and connect-error classification.

use sqlx::MySqlPool;
use sqlx::error::DatabaseError;
use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPoolOptions};

use super::MySqlAdapter;
use crate::adapters::{ConnectionConfig, helpers};
use crate::error::ConnectionErrorKind;
use crate::{ConnectionDescriptor, Result};

impl MySqlAdapter {
    /// Opens a pool against the descriptor and verifies it with `SELECT 1`.
    pub async fn connect(descriptor: &ConnectionDescriptor, config: &ConnectionConfig) -> Result<Self> {
        let options = connect_options(descriptor);
        let pool = create_connection_pool(options, config)
            .await
            .map_err(|e| helpers::connect_error(descriptor, e, classify_database_error))?;

        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| helpers::connect_error(descriptor, e, classify_database_error))?;

        Ok(Self {
            pool,
            database: descriptor.database().to_string(),
        })
    }
}

pub(crate) fn connect_options(descriptor: &ConnectionDescriptor) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(descriptor.hostname())
        .username(descriptor.username())
        .database(descriptor.database());

    if let Some(port) = descriptor.effective_port() {
        options = options.port(port);
    }
    if let Some(password) = descriptor.password() {
        options = options.password(password);
    }
    options
}

async fn create_connection_pool(
    options: MySqlConnectOptions,
    config: &ConnectionConfig,
) -> std::result::Result<MySqlPool, sqlx::Error> {
    use sqlx::Executor;

    let execution_time_ms = config.server_timeout_ms();
    let read_only = config.read_only;

    MySqlPoolOptions::new()
        .max_connections(config.max_connections.min(100))
        .min_connections(1)
        .acquire_timeout(config.connect_timeout)
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if let Some(timeout_ms) = execution_time_ms {
                    conn.execute(format!("SET SESSION max_execution_time = {}", timeout_ms).as_str())
                        .await?;
                }

                if read_only {
                    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                }

                // Consistent rendering of TIMESTAMP aggregates
                conn.execute("SET time_zone = '+00:00'").await?;

                Ok(())
            })
        })
        .connect_with(options)
        .await
}

pub(crate) fn classify_database_error(error: &dyn DatabaseError) -> Option<ConnectionErrorKind> {
    let mysql_error = error.try_downcast_ref::<MySqlDatabaseError>()?;
    classify_error_number(mysql_error.number())
}

pub(crate) fn classify_error_number(number: u16) -> Option<ConnectionErrorKind> {
    match number {
        // ER_ACCESS_DENIED_ERROR, ER_DBACCESS_DENIED_ERROR
        1045 | 1044 => Some(ConnectionErrorKind::AuthenticationFailed),
        // ER_BAD_DB_ERROR
        1049 => Some(ConnectionErrorKind::DatabaseNotFound),
        _ => None,
    }
}
