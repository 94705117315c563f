//! Path lookup entrypoint: query a path-keyed store by SHA-256 path digest.

mod hashing;
mod keys;
mod logging;
mod lookup;
mod report;
mod settings;
mod store;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::hashing::derive_key;
use crate::logging::init_logging;
use crate::lookup::PathLookup;
use crate::report::{write_companions, write_key, write_record, write_record_json};
use crate::settings::{LookupMode, Overrides, Settings};
use crate::store::open_store;

/// CLI arguments for path lookups.
#[derive(Parser, Debug)]
#[command(
    name = "path-lookup",
    version,
    about = "Look up path records in a key-value store by SHA-256 path digest"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, value_name = "FILE", env = "PATH_LOOKUP_CONFIG")]
    config: Option<PathBuf>,

    /// Store host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Store port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Logical database index
    #[arg(long, global = true)]
    db: Option<i64>,

    /// Serve reads from a JSON snapshot instead of a live store
    #[arg(long, global = true, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Log level or filter directive (overridden by PATH_LOOKUP_LOG)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up stored data for each path
    Lookup {
        /// Paths to look up, in order
        #[arg(required = true)]
        paths: Vec<OsString>,

        /// Read only the primary key
        #[arg(long, conflicts_with = "with_file_hash")]
        primary_only: bool,

        /// Also read the file hash key when data is found
        #[arg(long)]
        with_file_hash: bool,

        /// Emit one JSON object per path
        #[arg(long)]
        json: bool,
    },
    /// Print the derived lookup key for each path without touching the store
    Hash {
        #[arg(required = true)]
        paths: Vec<OsString>,
    },
    /// Show the companion keys recorded for each path
    Inspect {
        #[arg(required = true)]
        paths: Vec<OsString>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_logging(&settings.logging)?;
    run(cli.command, &settings)
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mode = match &cli.command {
        Command::Lookup {
            primary_only: true,
            ..
        } => Some(LookupMode::Primary),
        Command::Lookup {
            with_file_hash: true,
            ..
        } => Some(LookupMode::WithFileHash),
        _ => None,
    };
    let overrides = Overrides {
        host: cli.global.host.clone(),
        port: cli.global.port,
        db: cli.global.db,
        snapshot: cli.global.snapshot.clone(),
        mode,
        log_level: cli.global.log_level.clone(),
    };
    settings::load(cli.global.config.as_deref(), overrides).context("load configuration")
}

fn run(command: Command, settings: &Settings) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match command {
        Command::Hash { paths } => {
            for path in &paths {
                write_key(&mut out, &derive_key(path.as_bytes()), &path.to_string_lossy())?;
            }
        }
        Command::Lookup { paths, json, .. } => {
            let store = open_store(&settings.store).context("open store")?;
            let mut lookup = PathLookup::new(store, settings.lookup.mode);
            for path in &paths {
                let record = lookup
                    .query(path)
                    .with_context(|| format!("look up {}", path.to_string_lossy()))?;
                if json {
                    write_record_json(&mut out, &record)?;
                } else {
                    write_record(&mut out, &record)?;
                }
            }
        }
        Command::Inspect { paths } => {
            let store = open_store(&settings.store).context("open store")?;
            let mut lookup = PathLookup::new(store, settings.lookup.mode);
            for path in &paths {
                let inspection = lookup
                    .inspect(path)
                    .with_context(|| format!("inspect {}", path.to_string_lossy()))?;
                write_companions(&mut out, &inspection)?;
            }
        }
    }
    out.flush().context("flush stdout")?;
    Ok(())
}
