//! Connection descriptor with automatic memory zeroing.
//!
//! # Security
//! - Username and password are stored in `Zeroizing<T>` containers
//! - The whole descriptor is zeroed when dropped
//! - `Debug` masks the password and `Display` omits it entirely
//! - No password-bearing URL is ever built from a descriptor; adapters set
//!   each connect option field by field

use zeroize::{Zeroize, Zeroizing};

use crate::models::DatabaseEngine;

/// Everything needed to open a session against one database.
///
/// Immutable once handed to `connect`. For SQLite, `database` is a file path
/// or `:memory:` and `hostname` is ignored.
///
/// # Example
///
/// ```rust
/// use dbprofiler_core::{ConnectionDescriptor, DatabaseEngine};
///
/// let descriptor = ConnectionDescriptor::new(
///     DatabaseEngine::PostgreSQL,
///     "profiler",
///     "secret",
///     "db.internal",
///     "sales",
/// )
/// .with_port(6432);
///
/// assert_eq!(descriptor.to_string(), "postgres://profiler@db.internal:6432/sales");
/// assert!(!format!("{:?}", descriptor).contains("secret"));
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct ConnectionDescriptor {
    #[zeroize(skip)]
    engine: DatabaseEngine,
    username: Zeroizing<String>,
    password: Zeroizing<String>,
    hostname: String,
    port: Option<u16>,
    database: String,
}

impl ConnectionDescriptor {
    /// Creates a descriptor. An empty password means "no password".
    pub fn new(
        engine: DatabaseEngine,
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            username: Zeroizing::new(username.into()),
            password: Zeroizing::new(password.into()),
            hostname: hostname.into(),
            port: None,
            database: database.into(),
        }
    }

    /// Descriptor for a SQLite file path or `:memory:`.
    pub fn sqlite(database: impl Into<String>) -> Self {
        Self::new(DatabaseEngine::SQLite, "", "", "", database)
    }

    /// Overrides the engine's default port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn engine(&self) -> DatabaseEngine {
        self.engine
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Explicit port, if one was set.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Explicit port or the engine default.
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| self.engine.default_port())
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Checks if a password is present without exposing it.
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// Raw password, only for handing to a driver's connect options.
    pub(crate) fn password(&self) -> Option<&str> {
        if self.password.is_empty() {
            None
        } else {
            Some(self.password.as_str())
        }
    }
}

impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("engine", &self.engine)
            .field("username", &self.username.as_str())
            .field("password", &if self.has_password() { "****" } else { "" })
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// Credential-free rendering, safe for logs and error context.
impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.engine == DatabaseEngine::SQLite {
            return write!(f, "sqlite://{}", self.database);
        }

        write!(f, "{}://", self.engine.scheme())?;
        if !self.username.is_empty() {
            write!(f, "{}@", self.username.as_str())?;
        }
        write!(f, "{}", self.hostname)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        write!(f, "/{}", self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg() -> ConnectionDescriptor {
        ConnectionDescriptor::new(
            DatabaseEngine::PostgreSQL,
            "admin",
            "hunter2",
            "localhost",
            "inventory",
        )
    }

    #[test]
    fn test_display_omits_password() {
        let rendered = pg().to_string();
        assert_eq!(rendered, "postgres://admin@localhost/inventory");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_debug_masks_password() {
        let debug = format!("{:?}", pg());
        assert!(debug.contains("****"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_effective_port() {
        assert_eq!(pg().effective_port(), Some(5432));
        assert_eq!(pg().with_port(15432).effective_port(), Some(15432));
        assert_eq!(ConnectionDescriptor::sqlite(":memory:").effective_port(), None);
    }

    #[test]
    fn test_empty_password_is_absent() {
        let descriptor =
            ConnectionDescriptor::new(DatabaseEngine::MySQL, "root", "", "db", "shop");
        assert!(!descriptor.has_password());
        assert_eq!(descriptor.password(), None);
        assert_eq!(pg().password(), Some("hunter2"));
    }

    #[test]
    fn test_sqlite_display() {
        let descriptor = ConnectionDescriptor::sqlite("/var/data/app.db");
        assert_eq!(descriptor.to_string(), "sqlite:///var/data/app.db");
        assert_eq!(descriptor.engine(), DatabaseEngine::SQLite);
    }
}
