//! Configuration types for database adapters.
//!
//! - `ConnectionConfig`: session tunables (timeouts, pool size, read-only)
//! - `CatalogFilter`: system schema and table denylists
//!
//! # Security
//! These configuration structs intentionally do NOT store passwords or credentials.

mod catalog;
mod connection;

pub use catalog::CatalogFilter;
pub use connection::ConnectionConfig;
