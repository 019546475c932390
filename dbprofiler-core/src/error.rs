//! Error types with credential sanitization.
//!
//! No variant carries a password or a password-bearing connection string.
//! Connection failures carry a [`ConnectionErrorKind`] so callers can tell
//! bad credentials from an unreachable host without parsing messages.

use std::time::Duration;

use thiserror::Error;

/// Classification of a failed connection attempt.
///
/// All kinds are terminal: nothing in this crate retries a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    /// The server rejected the username or password.
    AuthenticationFailed,
    /// The server is reachable but the named database does not exist.
    DatabaseNotFound,
    /// The host could not be resolved or reached in time.
    HostUnreachable,
    /// Any other failure during connection establishment.
    Unknown,
}

impl std::fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::AuthenticationFailed => "authentication failed",
            Self::DatabaseNotFound => "database not found",
            Self::HostUnreachable => "host unreachable",
            Self::Unknown => "unknown failure",
        };
        f.write_str(label)
    }
}

/// Main error type for DBProfiler operations.
///
/// # Security
/// All error messages are sanitized to prevent credential leakage.
#[derive(Debug, Error)]
pub enum DbProfilerError {
    /// Database connection failed (credentials sanitized)
    #[error("Database connection failed ({kind}): {context}")]
    Connection {
        kind: ConnectionErrorKind,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The session was used after `disconnect`
    #[error("Session is closed")]
    SessionClosed,

    /// Catalog introspection query failed
    #[error("Catalog introspection failed: {context}")]
    Introspection {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A row count or aggregate could not be computed
    #[error("Statistic '{statistic}' unavailable for {target}: {reason}")]
    StatisticsUnavailable {
        statistic: String,
        target: String,
        reason: String,
    },

    /// No anomaly kind with this name is registered for the engine
    #[error("Anomaly kind '{kind}' is not supported for {engine}")]
    UnsupportedAnomaly { kind: String, engine: String },

    /// Referenced schema, table or column does not exist
    #[error("Target not found: {target}")]
    TargetNotFound { target: String },

    /// Anomaly definition is missing a key or has an ill-typed value
    #[error("Invalid anomaly definition: {message}")]
    InvalidAnomaly { message: String },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Query execution failure
    #[error("Query execution failed: {context}")]
    QueryExecution { context: String },

    /// A session operation exceeded the configured query timeout
    #[error("Query timed out after {}s: {context}", timeout.as_secs_f64())]
    QueryTimeout { context: String, timeout: Duration },

    /// Unsupported database feature or operation
    #[error("Unsupported operation: {feature} not supported for {database_type}")]
    UnsupportedFeature {
        feature: String,
        database_type: String,
    },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results with DbProfilerError
pub type Result<T> = std::result::Result<T, DbProfilerError>;

impl DbProfilerError {
    /// Creates a connection error of the given kind with sanitized context
    pub fn connection<E>(kind: ConnectionErrorKind, context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an introspection error with context
    pub fn introspection<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Introspection {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a statistics error naming the statistic and its target
    pub fn statistics_unavailable(
        statistic: impl Into<String>,
        target: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::StatisticsUnavailable {
            statistic: statistic.into(),
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an unsupported anomaly error
    pub fn unsupported_anomaly(kind: impl Into<String>, engine: impl std::fmt::Display) -> Self {
        Self::UnsupportedAnomaly {
            kind: kind.into(),
            engine: engine.to_string(),
        }
    }

    /// Creates a target-not-found error
    pub fn target_not_found(target: impl Into<String>) -> Self {
        Self::TargetNotFound {
            target: target.into(),
        }
    }

    /// Creates an invalid anomaly definition error
    pub fn invalid_anomaly(message: impl Into<String>) -> Self {
        Self::InvalidAnomaly {
            message: message.into(),
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a query execution error
    pub fn query_failed(context: impl Into<String>) -> Self {
        Self::QueryExecution {
            context: context.into(),
        }
    }

    /// Creates a query timeout error
    pub fn query_timeout(context: impl Into<String>, timeout: Duration) -> Self {
        Self::QueryTimeout {
            context: context.into(),
            timeout,
        }
    }

    /// Creates an unsupported feature error
    pub fn unsupported_feature(
        feature: impl Into<String>,
        database_type: impl Into<String>,
    ) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            database_type: database_type.into(),
        }
    }

    /// Returns the connection failure kind, if this is a connection error.
    pub fn connection_kind(&self) -> Option<ConnectionErrorKind> {
        match self {
            Self::Connection { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the error invalidates the whole session rather than one object.
    ///
    /// The profile assembler absorbs per-table failures but always propagates
    /// these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::SessionClosed | Self::QueryTimeout { .. }
        )
    }
}
