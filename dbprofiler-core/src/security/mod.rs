//! Credential handling and SQL identifier safety.
//!
//! # Security Guarantees
//! - Credentials are zeroed from memory on drop
//! - Passwords never appear in `Debug`, `Display`, logs or errors
//! - SQL identifiers are quoted by doubling the engine's quote character;
//!   values are never interpolated

pub mod descriptor;
pub mod identifiers;

pub use descriptor::ConnectionDescriptor;
pub use identifiers::{Dialect, quote_identifier};
