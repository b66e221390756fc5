//! Database Engine Traits and Core Types
//!
//! This module defines the `QueryExecutor` contract every service talks to, and the
//! connection parameters used to open one. Each engine (`PostgreSQL`, `SQLite`)
//! implements the trait over one long-lived connection owned by the session.
//!
//! # Statement Conventions
//! - Parameters are always bound, never spliced into SQL text
//! - Placeholders are written `$1..$n` (engines translate where needed)
//! - Result values come back as text; numeric columns should be `CAST(.. AS TEXT)`
//!   in the statement so both engines render them the same way
//!
//! # Engine Isolation
//! Each engine implementation is completely independent.
//! No shared driver helpers or cross-engine abstractions beyond this module.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;

use crate::error::{CafeError, Result};

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

/// Default per-statement timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Supported database engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `PostgreSQL` database
    Postgres,
    /// `SQLite` database
    #[value(name = "sqlite")]
    SQLite,
}

impl DatabaseType {
    /// Get the engine name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::SQLite => "sqlite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection configuration for database engines
///
/// This struct contains all parameters needed to establish a database connection.
/// Fields are engine-specific (e.g., `file` only applies to `SQLite`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database engine type
    pub engine: DatabaseType,

    /// Hostname (for postgres)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port number (for postgres)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Username (for postgres)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password (for postgres)
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database name (for postgres)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Database file path (for sqlite)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Per-statement timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    /// Create a new `PostgreSQL` connection config
    #[must_use]
    pub const fn postgres(
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    ) -> Self {
        Self {
            engine: DatabaseType::Postgres,
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            database: Some(database),
            file: None,
            timeout_ms: None,
        }
    }

    /// Create a new `SQLite` connection config
    #[must_use]
    pub const fn sqlite(file: PathBuf) -> Self {
        Self {
            engine: DatabaseType::SQLite,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            file: Some(file),
            timeout_ms: None,
        }
    }

    /// Set the per-statement timeout
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Effective timeout (configured value or [`DEFAULT_TIMEOUT_MS`])
    #[must_use]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

/// Bound statement parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl SqlParam {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One result row: ordered columns rendered as text, `None` for SQL NULL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
}

impl Row {
    #[must_use]
    pub const fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw column value
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(Option::as_deref)
    }

    /// Column value with NULL read as the empty string
    #[must_use]
    pub fn text(&self, idx: usize) -> String {
        self.get(idx).unwrap_or_default().to_string()
    }

    /// Column value that must not be NULL
    pub fn required(&self, idx: usize, column: &str) -> Result<&str> {
        self.get(idx)
            .ok_or_else(|| CafeError::persistence(format!("column '{column}' is unexpectedly NULL")))
    }

    /// Integer column
    pub fn integer(&self, idx: usize, column: &str) -> Result<i64> {
        let raw = self.required(idx, column)?;
        raw.trim().parse().map_err(|_| {
            CafeError::persistence(format!("column '{column}' is not an integer: '{raw}'"))
        })
    }

    /// Boolean column (`true`/`false` from Postgres, `1`/`0` from SQLite)
    pub fn boolean(&self, idx: usize, column: &str) -> Result<bool> {
        match self.required(idx, column)?.trim() {
            "t" | "true" | "1" => Ok(true),
            "f" | "false" | "0" => Ok(false),
            other => Err(CafeError::persistence(format!(
                "column '{column}' is not a boolean: '{other}'"
            ))),
        }
    }
}

/// Abstract capability for issuing parameterized reads/writes against the store
///
/// Implementations hold one connection and may be shared by reference between
/// the services of a session.
pub trait QueryExecutor: Send + Sync {
    /// Engine behind this executor
    fn engine(&self) -> DatabaseType;

    /// Execute a mutation and return the number of affected rows
    fn execute(&self, sql: &str, params: &[SqlParam]) -> impl Future<Output = Result<u64>> + Send;

    /// Execute a read (or a mutation with `RETURNING`) and return its rows
    fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

/// Executor for whichever engine a [`ConnectionConfig`] selects
pub enum Store {
    #[cfg(feature = "postgres")]
    Postgres(postgres::PostgresExecutor),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteExecutor),
}

impl Store {
    /// Open a connection for the configured engine
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        match config.engine {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => Ok(Self::Postgres(postgres::PostgresExecutor::connect(config).await?)),
            #[cfg(feature = "sqlite")]
            DatabaseType::SQLite => Ok(Self::Sqlite(sqlite::SqliteExecutor::connect(config)?)),
            #[allow(unreachable_patterns)]
            other => Err(CafeError::connection_failed(format!(
                "engine '{other}' is not enabled in this build"
            ))),
        }
    }

    /// Close the underlying connection
    pub async fn close(self) {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(executor) => executor.close().await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(executor) => executor.close(),
        }
    }
}

impl QueryExecutor for Store {
    fn engine(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(executor) => executor.engine(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(executor) => executor.engine(),
        }
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(executor) => executor.execute(sql, params).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(executor) => executor.execute(sql, params).await,
        }
    }

    async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>> {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(executor) => executor.query(sql, params).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(executor) => executor.query(sql, params).await,
        }
    }
}
