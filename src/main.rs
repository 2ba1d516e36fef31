//! kvlite: command-line access to a kvlite store.
//!
//! ```bash
//! kvlite put session:1 '{"user":"alice"}' --ttl 3600 --meta source=cli
//! kvlite get session: --prefix --limit 10
//! kvlite list --prefix session:
//! kvlite del session:1
//! ```

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use kvlite::{DeleteOptions, ListOptions, ReadOptions, Record, Store, StoreOptions, WriteOptions};

#[derive(Parser, Debug)]
#[command(name = "kvlite")]
#[command(about = "Embedded namespaced key-value store with TTL", version)]
struct Cli {
    /// Store options file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding database files (default: $KVLITE_HOME or ~/.kvlite)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Database to operate on
    #[arg(short, long, global = true, default_value = "")]
    database: String,

    /// Table to operate on
    #[arg(short, long, global = true, default_value = "")]
    table: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a record, replacing any existing one
    Put {
        key: String,
        value: String,
        /// Time-to-live in seconds (0 never expires)
        #[arg(long, default_value = "0")]
        ttl: u64,
        /// Metadata entry as key=value; values parse as JSON when possible
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, serde_json::Value)>,
    },
    /// Read a record, or scan by prefix/suffix
    Get {
        key: String,
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Delete a record
    Del { key: String },
    /// List live keys
    List {
        /// Only keys starting with this string
        #[arg(long)]
        prefix: Option<String>,
        /// Only keys ending with this string
        #[arg(long)]
        suffix: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Match keys starting with KEY
    #[arg(long)]
    prefix: bool,
    /// Match keys ending with KEY
    #[arg(long)]
    suffix: bool,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args, Debug)]
struct PageArgs {
    /// Maximum number of results (0 is unbounded)
    #[arg(long, default_value = "0")]
    limit: usize,
    /// Results to skip, in descending key order
    #[arg(long, default_value = "0")]
    offset: usize,
}

fn parse_meta(s: &str) -> Result<(String, serde_json::Value)> {
    let Some((key, raw)) = s.split_once('=') else {
        bail!("expected key=value, got '{s}'");
    };
    if key.is_empty() {
        bail!("metadata key must not be empty");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::from(raw));
    Ok((key.to_string(), value))
}

fn main() -> ExitCode {
    init_logging();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Initialize stderr logging, filtered by `RUST_LOG` (default: warn).
fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut options = match &cli.config {
        Some(path) => StoreOptions::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => StoreOptions::default(),
    };
    if let Some(dir) = cli.dir {
        options.dir = Some(dir);
    }

    let store = Store::open(options).context("Failed to open store")?;
    let (database, table) = (cli.database, cli.table);

    match cli.command {
        Command::Put {
            key,
            value,
            ttl,
            meta,
        } => {
            let mut record = Record::new(key, value).with_expiry(Duration::from_secs(ttl));
            record.metadata.extend(meta);
            store
                .write(&record, WriteOptions::to_table(database, table))
                .with_context(|| format!("Failed to write '{}'", record.key))?;
        },
        Command::Get { key, scan } => {
            let options = ReadOptions {
                prefix: scan.prefix,
                suffix: scan.suffix,
                limit: scan.page.limit,
                offset: scan.page.offset,
                ..ReadOptions::from_table(database, table)
            };
            let records = match store.read(&key, options) {
                Ok(records) => records,
                Err(e) if e.is_not_found() => {
                    eprintln!("{e}");
                    return Ok(ExitCode::from(2));
                },
                Err(e) => return Err(e).context("Failed to read"),
            };
            for record in records {
                println!("{}", serde_json::to_string(&record)?);
            }
        },
        Command::Del { key } => {
            let removed = store
                .delete(&key, DeleteOptions::from_table(database, table))
                .with_context(|| format!("Failed to delete '{key}'"))?;
            if !removed {
                tracing::info!(key = %key, "Key did not exist");
            }
        },
        Command::List {
            prefix,
            suffix,
            page,
        } => {
            let options = ListOptions {
                prefix,
                suffix,
                limit: page.limit,
                offset: page.offset,
                ..ListOptions::from_table(database, table)
            };
            for key in store.list(options).context("Failed to list keys")? {
                println!("{key}");
            }
        },
    }

    store.close();
    Ok(ExitCode::SUCCESS)
}
