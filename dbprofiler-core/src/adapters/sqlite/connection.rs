//! SQLite connection handling.
//!
//! # Connection Modes
//! - File-based: `database` is a path to an existing file
//! - In-memory: `database` is `:memory:`
//!
//! Files are never created implicitly; a missing file is reported as
//! `DatabaseNotFound`. An in-memory database lives exactly as long as its
//! single pooled connection, so that pool never expires connections.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::error::DatabaseError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::SqliteAdapter;
use crate::adapters::{ConnectionConfig, helpers};
use crate::error::{ConnectionErrorKind, DbProfilerError};
use crate::{ConnectionDescriptor, Result};

/// `SQLITE_CANTOPEN` primary result code
const SQLITE_CANTOPEN: i64 = 14;

impl SqliteAdapter {
    /// Opens the database named by `descriptor.database()`.
    ///
    /// # Errors
    /// `DatabaseNotFound` for a missing file, other `Connection` kinds for
    /// everything sqlx reports while opening.
    pub async fn connect(descriptor: &ConnectionDescriptor, config: &ConnectionConfig) -> Result<Self> {
        let in_memory = is_memory_database(descriptor.database());

        if !in_memory && !file_exists(descriptor.database()).await {
            return Err(DbProfilerError::connection(
                ConnectionErrorKind::DatabaseNotFound,
                format!("opening {}", descriptor),
                std::io::Error::new(std::io::ErrorKind::NotFound, "database file does not exist"),
            ));
        }

        let options = connect_options(descriptor.database(), config.read_only)
            .map_err(|e| helpers::connect_error(descriptor, e, classify_database_error))?;
        let pool = create_sqlite_pool(options, config, in_memory)
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

pub(crate) fn is_memory_database(database: &str) -> bool {
    matches!(database, ":memory:" | "sqlite::memory:")
}

async fn file_exists(path: &str) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

pub(crate) fn connect_options(
    database: &str,
    read_only: bool,
) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    let options = if is_memory_database(database) {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::new()
            .filename(database)
            .create_if_missing(false)
            .read_only(read_only)
    };
    Ok(options)
}

async fn create_sqlite_pool(
    options: SqliteConnectOptions,
    config: &ConnectionConfig,
    in_memory: bool,
) -> std::result::Result<SqlitePool, sqlx::Error> {
    let pool_options = SqlitePoolOptions::new().acquire_timeout(config.connect_timeout);

    let pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(config.max_connections.max(1))
    };

    pool_options.connect_with(options).await
}

/// Maps SQLite result codes seen while opening a database.
pub(crate) fn classify_database_error(error: &dyn DatabaseError) -> Option<ConnectionErrorKind> {
    let code: i64 = error.code()?.parse().ok()?;
    classify_result_code(code)
}

pub(crate) fn classify_result_code(code: i64) -> Option<ConnectionErrorKind> {
    // Extended result codes keep the primary code in the low byte
    if code & 0xff == SQLITE_CANTOPEN {
        Some(ConnectionErrorKind::DatabaseNotFound)
    } else {
        None
    }
}
