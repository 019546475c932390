//! Library module for the dbprofiler binary.
//!
//! Argument definitions and command execution live here so they can be
//! tested; `main.rs` only parses, sets up logging and maps the exit code.
//!
//! # Security
//! - Passwords come from `DB_PASSWORD`, `--password` or an interactive
//!   prompt and are handed straight to a zeroizing descriptor
//! - Neither `Debug` output nor logs ever contain the password

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use dbprofiler_core::{
    AnomalyDefinition, AnomalyHandle, AnomalyRegistry, ConnectionConfig, ConnectionDescriptor,
    DatabaseEngine, Session, anomaly, connect_with_config, enabled_engines, profile,
};
use tracing::info;

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "dbprofiler")]
#[command(about = "Database profiling and anomaly injection tool")]
#[command(version)]
#[command(long_about = "
DBProfiler - database catalog profiling

Connects to a database, walks every non-system schema and table, and reports
row counts plus per-column type, nullability, default, minimum and maximum as
JSON. It can also inject a described anomaly into a table and later verify
that the anomaly is still present.

SUPPORTED DATABASES:
- PostgreSQL (--engine postgres)
- SQLite (--engine sqlite, --database is the file path)
- MySQL (--engine mysql) [if compiled with --features mysql]

EXAMPLES:
  DB_PASSWORD=secret dbprofiler --username app --database shop profile
  dbprofiler --engine sqlite --database ./shop.db profile --output shop.json
  dbprofiler --engine sqlite --database ./shop.db inject --table orders \\
      --definition '{\"kind\":\"outlier_value\",\"column\":\"price\",\"value\":1000000}' \\
      --handle-out handle.json
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Profile the database and write the JSON document
    Profile {
        /// Output file path (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write single-line JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },
    /// Test the database connection
    Test,
    /// Inject an anomaly into a table
    Inject {
        #[command(flatten)]
        target: AnomalyTarget,

        /// Where to write the anomaly handle (stdout when omitted)
        #[arg(long, value_name = "FILE")]
        handle_out: Option<PathBuf>,
    },
    /// Verify a previously injected anomaly is still present
    Verify {
        #[command(flatten)]
        target: AnomalyTarget,

        /// Handle file written by `inject`
        #[arg(long, value_name = "FILE")]
        handle: PathBuf,
    },
    /// List compiled-in engines and anomaly kinds
    List,
}

/// Table and definition shared by `inject` and `verify`
#[derive(Debug, Args)]
pub struct AnomalyTarget {
    /// Target table
    #[arg(long)]
    pub table: String,

    /// Target schema (engine default when omitted)
    #[arg(long)]
    pub schema: Option<String>,

    /// Anomaly definition as JSON, or @FILE to read it from a file
    #[arg(long, value_name = "JSON")]
    pub definition: String,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,
}

/// Connection settings, each with an environment fallback
#[derive(Args)]
pub struct ConnectionArgs {
    /// Database engine (postgres, mysql, sqlite)
    #[arg(long, env = "DB_ENGINE", default_value = "postgres", global = true)]
    pub engine: DatabaseEngine,

    #[arg(long, env = "DB_USERNAME", global = true)]
    pub username: Option<String>,

    /// Database password (never logged)
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Prompt for the password when none was supplied
    #[arg(long, global = true)]
    pub prompt_password: bool,

    #[arg(long, env = "DB_HOSTNAME", default_value = "localhost", global = true)]
    pub hostname: String,

    /// Server port (engine default when omitted)
    #[arg(long, env = "DB_PORT", global = true)]
    pub port: Option<u16>,

    /// Database name, or the file path for SQLite
    #[arg(long, env = "DB_NAME", global = true)]
    pub database: Option<String>,

    /// Deadline in seconds for every database operation
    #[arg(long, value_name = "SECS", global = true)]
    pub query_timeout: Option<u64>,

    /// Deadline in seconds for establishing the connection
    #[arg(long, value_name = "SECS", default_value = "30", global = true)]
    pub connect_timeout: u64,

    /// Open the session read-only
    #[arg(long, global = true)]
    pub read_only: bool,
}

impl std::fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionArgs")
            .field("engine", &self.engine)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("query_timeout", &self.query_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl ConnectionArgs {
    /// Builds the descriptor, prompting for the password if requested.
    pub fn descriptor(&self) -> anyhow::Result<ConnectionDescriptor> {
        let Some(database) = self.database.as_deref() else {
            bail!("--database (or DB_NAME) is required");
        };

        if self.engine == DatabaseEngine::SQLite {
            return Ok(ConnectionDescriptor::sqlite(database));
        }

        let password = match (&self.password, self.prompt_password) {
            (Some(password), _) => password.clone(),
            (None, true) => rpassword::prompt_password("Database password: ")
                .context("Failed to read password")?,
            (None, false) => String::new(),
        };

        let descriptor = ConnectionDescriptor::new(
            self.engine,
            self.username.as_deref().unwrap_or_default(),
            password,
            &self.hostname,
            database,
        );
        Ok(match self.port {
            Some(port) => descriptor.with_port(port),
            None => descriptor,
        })
    }

    /// Session tunables from the flags.
    pub fn config(&self) -> anyhow::Result<ConnectionConfig> {
        let mut config = ConnectionConfig::new()
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
            .with_read_only(self.read_only);
        if let Some(secs) = self.query_timeout {
            config = config.with_query_timeout(Duration::from_secs(secs));
        }
        config.validate().context("Invalid connection settings")?;
        Ok(config)
    }
}

/// Parses a definition given inline or as `@FILE`.
pub fn parse_definition(raw: &str) -> anyhow::Result<AnomalyDefinition> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read definition file {}", path))?,
        None => raw.to_string(),
    };
    let value: serde_json::Value =
        serde_json::from_str(&text).context("Definition is not valid JSON")?;
    Ok(anomaly::definition(value)?)
}

/// Text printed by `list`.
pub fn list_output() -> String {
    let mut out = String::from("Supported Database Engines:\n");
    for engine in enabled_engines() {
        let port = engine
            .default_port()
            .map_or_else(|| "file path".to_string(), |p| format!("default port {}", p));
        out.push_str(&format!("  {:<12} --engine {} ({})\n", engine.to_string(), engine.scheme(), port));
    }
    out.push_str("\nAnomaly Kinds:\n");
    for kind in AnomalyRegistry::default().kinds() {
        out.push_str(&format!("  {}\n", kind));
    }
    out
}

/// Executes the command; `Ok(false)` means a verification came back negative.
pub async fn execute(cli: &Cli) -> anyhow::Result<bool> {
    if let Command::List = cli.command {
        print!("{}", list_output());
        return Ok(true);
    }

    let descriptor = cli.connection.descriptor()?;
    let config = cli.connection.config()?;
    let session = connect_with_config(&descriptor, &config)
        .await
        .with_context(|| format!("Failed to connect to {}", descriptor))?;

    // The caller reports errors
    let outcome = run_with_session(cli, &session).await;
    session.disconnect().await;
    outcome
}

async fn run_with_session(cli: &Cli, session: &Session) -> anyhow::Result<bool> {
    match &cli.command {
        Command::Profile { output, compact } => {
            let document = profile(session, session.database_name())
                .await
                .context("Profiling failed")?;
            let json = if *compact {
                serde_json::to_string(&document).context("Failed to serialize profile")?
            } else {
                document.to_json_pretty()?
            };
            emit(&json, output.as_deref()).await?;
            Ok(true)
        }
        Command::Test => {
            session.ping().await.context("Connection test failed")?;
            info!("✓ Connection test successful");
            println!(
                "Connection to {} database '{}' successful",
                session.engine(),
                session.database_name()
            );
            Ok(true)
        }
        Command::Inject { target, handle_out } => {
            let definition = parse_definition(&target.definition)?;
            let handle = AnomalyRegistry::default()
                .inject(session, target.schema.as_deref(), &target.table, &definition)
                .await
                .context("Anomaly injection failed")?;
            let json =
                serde_json::to_string_pretty(&handle).context("Failed to serialize handle")?;
            emit(&json, handle_out.as_deref()).await?;
            Ok(true)
        }
        Command::Verify { target, handle } => {
            let definition = parse_definition(&target.definition)?;
            let handle = read_handle(handle).await?;
            if let Some(schema) = &target.schema
                && *schema != handle.schema
            {
                bail!(
                    "Handle {} targets schema '{}', not '{}'",
                    handle.id,
                    handle.schema,
                    schema
                );
            }
            let present = AnomalyRegistry::default()
                .verify(session, &target.table, &definition, &handle)
                .await
                .context("Anomaly verification failed")?;
            println!("{}", if present { "present" } else { "absent" });
            Ok(present)
        }
        Command::List => Ok(true),
    }
}

async fn read_handle(path: &Path) -> anyhow::Result<AnomalyHandle> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read handle file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid handle file {}", path.display()))
}

/// Writes to `path`, or stdout when there is none.
async fn emit(content: &str, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("Failed to write to {}", path.display()))?;
            info!("✓ Output written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
