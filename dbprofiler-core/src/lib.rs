//! Core library for DBProfiler.
//!
//! Connects to a PostgreSQL, MySQL or SQLite database, walks its catalog
//! and produces a [`ProfileDocument`]: per database the character encoding
//! and collation, and per non-system table the row count and per-column
//! type, nullability, default, minimum and maximum. It can also inject a
//! described anomaly into a table and later verify the anomaly is still
//! present.
//!
//! # Security Guarantees
//! - Credentials are zeroed on drop and never logged or put in errors
//! - Identifiers reaching SQL come from the catalog and are quoted
//! - Values are always bound as parameters
//!
//! # Architecture
//! - `adapters`: one [`DatabaseAdapter`](adapters::DatabaseAdapter) per engine, chosen by a factory
//! - `session`: owns an adapter, enforces deadlines and the closed state
//! - `catalog`, `statistics`, `profile`: engine-agnostic profiling on top of a session
//! - `anomaly`: registry of injectable anomaly kinds
//!
//! # Example
//! ```rust,no_run
//! use dbprofiler_core::{ConnectionDescriptor, connect, profile};
//!
//! # async fn run() -> dbprofiler_core::Result<()> {
//! let session = connect(&ConnectionDescriptor::sqlite("inventory.db")).await?;
//! let document = profile(&session, "inventory").await?;
//! println!("{}", document.to_json_pretty()?);
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod anomaly;
pub mod catalog;
pub mod error;
pub mod logging;
pub mod models;
pub mod profile;
pub mod security;
pub mod session;
pub mod statistics;

// Re-export commonly used types
pub use adapters::{CatalogFilter, ConnectionConfig, enabled_engines};
pub use anomaly::{AnomalyDefinition, AnomalyHandle, AnomalyPredicate, AnomalyRegistry};
pub use error::{ConnectionErrorKind, DbProfilerError, Result};
pub use models::{
    ColumnDescriptor, ColumnInfo, DatabaseEngine, DatabaseProfile, ProfileDocument,
    ProfileSummary, RowMap, SchemaDescriptor, ServerSettings, TableDescriptor,
};
pub use profile::{profile, profile_database};
pub use security::ConnectionDescriptor;
pub use session::{Session, connect, connect_with_config};
