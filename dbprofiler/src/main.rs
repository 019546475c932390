//! Database profiling tool.
//!
//! Profiles the catalog of a PostgreSQL, MySQL or SQLite database into a
//! JSON document and injects or verifies data anomalies.
//!
//! # Security Guarantees
//! - Passwords are never logged or echoed
//! - Logs go to stderr so JSON on stdout stays parseable

use std::process::ExitCode;

use clap::Parser;
use dbprofiler::{Cli, execute};
use dbprofiler_core::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    if execute(&cli).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
