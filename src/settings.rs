//! Layered run configuration: defaults, optional file, environment, CLI flags.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment prefix for configuration overrides (`PATH_LOOKUP__STORE__PORT`).
pub(crate) const ENV_PREFIX: &str = "PATH_LOOKUP";

/// Complete configuration for a run. Immutable once loaded.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) store: StoreConfig,
    pub(crate) lookup: LookupConfig,
    pub(crate) logging: LoggingConfig,
}

/// Connection parameters for the key-value store.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub(crate) struct StoreConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) db: i64,
    /// JSON snapshot to serve reads from instead of a live server.
    pub(crate) snapshot: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            snapshot: None,
        }
    }
}

impl StoreConfig {
    /// Connection URL understood by the redis client.
    pub(crate) fn redis_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("redis://[{}]:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        }
    }
}

/// Which reads a lookup performs.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum LookupMode {
    /// Primary key only.
    Primary,
    /// Primary key, then the file hash key when the primary is present.
    #[default]
    WithFileHash,
}

impl LookupMode {
    pub(crate) fn includes_file_hash(self) -> bool {
        matches!(self, Self::WithFileHash)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub(crate) struct LookupConfig {
    pub(crate) mode: LookupMode,
}

/// Log output format.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct LoggingConfig {
    /// Level or `EnvFilter` directive; `PATH_LOOKUP_LOG` takes precedence.
    pub(crate) level: String,
    pub(crate) format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Explicit overrides from the command line; `None` leaves the layered value.
#[derive(Debug, Default, Clone)]
pub(crate) struct Overrides {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) db: Option<i64>,
    pub(crate) snapshot: Option<PathBuf>,
    pub(crate) mode: Option<LookupMode>,
    pub(crate) log_level: Option<String>,
}

/// Load settings from an optional file plus the process environment.
pub(crate) fn load(file: Option<&Path>, overrides: Overrides) -> Result<Settings, ConfigError> {
    load_with_env(file, Environment::with_prefix(ENV_PREFIX), overrides)
}

fn load_with_env(
    file: Option<&Path>,
    env: Environment,
    overrides: Overrides,
) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(File::from(path).required(true));
    }
    builder = builder.add_source(env.prefix_separator("__").separator("__").try_parsing(true));
    let mut settings: Settings = builder.build()?.try_deserialize()?;
    apply_overrides(&mut settings, overrides);
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, overrides: Overrides) {
    if let Some(host) = overrides.host {
        settings.store.host = host;
    }
    if let Some(port) = overrides.port {
        settings.store.port = port;
    }
    if let Some(db) = overrides.db {
        settings.store.db = db;
    }
    if let Some(snapshot) = overrides.snapshot {
        settings.store.snapshot = Some(snapshot);
    }
    if let Some(mode) = overrides.mode {
        settings.lookup.mode = mode;
    }
    if let Some(level) = overrides.log_level {
        settings.logging.level = level;
    }
}
