//! Configuration Management
//!
//! This module loads cafe settings from JSON files and merges them with
//! command-line overrides.
//!
//! # Configuration Locations
//! - Local: `.cafe/config.json` (per working directory, team-shareable)
//! - Global: `~/.config/cafe/config.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Command-line flags (highest priority)
//! 2. Local config file (`.cafe/config.json`)
//! 3. Global config file (`~/.config/cafe/config.json`)
//! 4. Built-in defaults
//!
//! # Example
//! ```json
//! {
//!   "host": "db.internal",
//!   "password_env": "CAFE_PROD_PASSWORD",
//!   "timeout_ms": 5000,
//!   "case_insensitive_search": true
//! }
//! ```
//!
//! The database password itself is never stored in a config file; `password_env`
//! names the environment variable that holds it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{ConnectionConfig, DatabaseType, DEFAULT_TIMEOUT_MS};
use crate::error::{CafeError, Result};

/// Environment variable read for the database password when none is configured
pub const DEFAULT_PASSWORD_ENV: &str = "CAFE_DB_PASSWORD";

/// Default database host
pub const DEFAULT_HOST: &str = "localhost";

/// Default number of attempts when two sessions race for the same order id
pub const DEFAULT_ORDER_ID_RETRIES: u32 = 8;

/// Default number of orders shown by the order history
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Contents of one config file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Environment variable holding the database password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_insensitive_search: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,
}

impl FileConfig {
    /// Layer `self` over `lower`: keys set in `self` win
    #[must_use]
    pub fn over(self, lower: Self) -> Self {
        Self {
            host: self.host.or(lower.host),
            password_env: self.password_env.or(lower.password_env),
            timeout_ms: self.timeout_ms.or(lower.timeout_ms),
            case_insensitive_search: self.case_insensitive_search.or(lower.case_insensitive_search),
            order_id_retries: self.order_id_retries.or(lower.order_id_retries),
            history_limit: self.history_limit.or(lower.history_limit),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub timeout_ms: Option<u64>,
    /// Flag form: only ever turns the option on
    pub case_insensitive_search: bool,
}

/// Fully resolved settings for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    /// Explicitly configured password variable, if any
    pub password_env: Option<String>,
    pub timeout_ms: u64,
    pub case_insensitive_search: bool,
    pub order_id_retries: u32,
    pub history_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(FileConfig::default(), &Overrides::default())
    }
}

impl Settings {
    /// Apply overrides and defaults to merged file config
    #[must_use]
    pub fn resolve(files: FileConfig, overrides: &Overrides) -> Self {
        Self {
            host: overrides
                .host
                .clone()
                .or(files.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            password_env: files.password_env,
            timeout_ms: overrides.timeout_ms.or(files.timeout_ms).unwrap_or(DEFAULT_TIMEOUT_MS),
            case_insensitive_search: overrides.case_insensitive_search
                || files.case_insensitive_search.unwrap_or(false),
            order_id_retries: files
                .order_id_retries
                .unwrap_or(DEFAULT_ORDER_ID_RETRIES)
                .max(1),
            history_limit: files.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        }
    }

    /// Load config files and resolve them against command-line overrides
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let files = load_with_precedence()?;
        Ok(Self::resolve(files, overrides))
    }

    /// Read the database password from the environment
    ///
    /// An explicitly configured variable must exist. Without configuration,
    /// [`DEFAULT_PASSWORD_ENV`] is consulted and a blank password is used if it is unset.
    pub fn resolve_password(&self) -> Result<String> {
        match &self.password_env {
            Some(env_var) => std::env::var(env_var).map_err(|_| {
                CafeError::config_error(format!(
                    "Environment variable {env_var} not found for password"
                ))
            }),
            None => Ok(std::env::var(DEFAULT_PASSWORD_ENV).unwrap_or_default()),
        }
    }

    /// Build the connection config for the chosen engine
    ///
    /// For `SQLite` the database name is the path of the database file.
    pub fn connection_config(
        &self,
        engine: DatabaseType,
        dbname: &str,
        port: u16,
        user: &str,
    ) -> Result<ConnectionConfig> {
        let config = match engine {
            DatabaseType::Postgres => ConnectionConfig::postgres(
                self.host.clone(),
                port,
                user.to_string(),
                self.resolve_password()?,
                dbname.to_string(),
            ),
            DatabaseType::SQLite => ConnectionConfig::sqlite(PathBuf::from(dbname)),
        };

        Ok(config.with_timeout_ms(self.timeout_ms))
    }
}

/// Get path to local config file (`.cafe/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        CafeError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".cafe").join("config.json"))
}

/// Get path to global config file (`~/.config/cafe/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| CafeError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("cafe").join("config.json"))
}

/// Load one config file; a missing file is an empty config
pub fn load_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CafeError::config_error(format!("Could not read config file {}: {e}", path.display()))
    })?;

    serde_json::from_str(&contents).map_err(|e| {
        CafeError::config_error(format!("Invalid config file {}: {e}", path.display()))
    })
}

/// Load local and global config files, local keys overriding global ones
pub fn load_with_precedence() -> Result<FileConfig> {
    let local = load_file(&local_config_path()?)?;

    // Without a config directory there is simply no global layer
    let global = match global_config_path() {
        Ok(path) => load_file(&path)?,
        Err(_) => FileConfig::default(),
    };

    tracing::debug!(?local, ?global, "loaded config files");
    Ok(local.over(global))
}
