//! `SQLite` Database Engine Implementation
//!
//! This module implements the `QueryExecutor` trait for `SQLite` databases.
//!
//! # Features
//! - File-based connections (`/path/to/cafe.db`)
//! - In-memory connections (`:memory:`) for throwaway sessions
//! - Foreign keys enforced on every connection
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, no async needed)
//! - `$N` placeholders are rewritten to `?N`
//! - BLOB data is Base64-encoded
//! - Timeouts enforced via `busy_timeout`; lock contention that outlives it is
//!   reported as a retryable conflict, distinct from unique-key violations
//! - Write statements take the database write lock before reading, so a single
//!   `INSERT .. SELECT MAX(..)` is serialized against other connections

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, OpenFlags, ToSql};
use std::borrow::Cow;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::engine::{ConnectionConfig, DatabaseType, QueryExecutor, Row, SqlParam};
use crate::error::{CafeError, Result};

/// `SQLite` executor over a single connection
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    /// Open the database file named by the config
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        // Validate config is for SQLite
        if config.engine != DatabaseType::SQLite {
            return Err(CafeError::connection_failed(format!(
                "Expected SQLite engine, got {}",
                config.engine
            )));
        }

        let file_path = config
            .file
            .as_ref()
            .ok_or_else(|| CafeError::connection_failed("SQLite requires 'file' parameter"))?;

        Self::open(file_path, config.timeout())
    }

    /// Open (creating if needed) a database file
    pub fn open(path: &Path, timeout: Duration) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            CafeError::connection_failed(format!("Failed to open SQLite database: {e}"))
        })?;
        Self::prepare_connection(conn, timeout)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CafeError::connection_failed(format!("Failed to open in-memory SQLite database: {e}"))
        })?;
        Self::prepare_connection(conn, Duration::from_millis(crate::engine::DEFAULT_TIMEOUT_MS))
    }

    fn prepare_connection(conn: Connection, timeout: Duration) -> Result<Self> {
        conn.busy_timeout(timeout).map_err(|e| {
            CafeError::connection_failed(format!("Failed to set busy timeout: {e}"))
        })?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            CafeError::connection_failed(format!("Failed to enable foreign keys: {e}"))
        })?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Close the connection
    pub fn close(self) {
        let conn = match self.conn.into_inner() {
            Ok(conn) => conn,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err((_, e)) = conn.close() {
            tracing::warn!(error = %e, "failed to close SQLite connection cleanly");
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CafeError::persistence("SQLite connection lock poisoned"))
    }
}

impl QueryExecutor for SqliteExecutor {
    fn engine(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        let conn = self.lock()?;
        execute_statement(&conn, sql, params)
    }

    async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>> {
        let conn = self.lock()?;
        query_rows(&conn, sql, params)
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Self::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
        })
    }
}

/// Execute a statement and return the number of changed rows
fn execute_statement(conn: &Connection, sql: &str, params: &[SqlParam]) -> Result<u64> {
    let sql = rewrite_placeholders(sql);
    let mut stmt = conn.prepare(&sql).map_err(map_sqlite_error)?;

    let changed = stmt
        .execute(rusqlite::params_from_iter(params.iter()))
        .map_err(map_sqlite_error)?;

    Ok(changed as u64)
}

/// Execute a statement and collect its rows as text
fn query_rows(conn: &Connection, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>> {
    let sql = rewrite_placeholders(sql);
    let mut stmt = conn.prepare(&sql).map_err(map_sqlite_error)?;
    let column_count = stmt.column_count();

    let mut rows = stmt
        .query(rusqlite::params_from_iter(params.iter()))
        .map_err(map_sqlite_error)?;

    let mut collected = Vec::new();
    while let Some(row) = rows.next().map_err(map_sqlite_error)? {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            let value = row.get_ref(idx).map_err(map_sqlite_error)?;
            values.push(sqlite_value_to_text(value, idx)?);
        }
        collected.push(Row::new(values));
    }

    Ok(collected)
}

/// Convert `SQLite` value to text
fn sqlite_value_to_text(value: ValueRef<'_>, idx: usize) -> Result<Option<String>> {
    Ok(match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(s) => Some(
            std::str::from_utf8(s)
                .map_err(|e| {
                    CafeError::persistence(format!("column {idx} is not valid UTF-8: {e}"))
                })?
                .to_string(),
        ),
        ValueRef::Blob(b) => {
            // Encode BLOB as Base64 so it survives as text
            use base64::Engine;
            Some(base64::engine::general_purpose::STANDARD.encode(b))
        }
    })
}

/// Rewrite `$N` placeholders to `SQLite`'s explicit `?N` form
///
/// Quoted string literals are left untouched.
fn rewrite_placeholders(sql: &str) -> Cow<'_, str> {
    if !sql.contains('$') {
        return Cow::Borrowed(sql);
    }

    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                result.push(ch);
            }
            '$' if !in_literal && chars.peek().is_some_and(char::is_ascii_digit) => {
                result.push('?');
            }
            _ => result.push(ch),
        }
    }

    Cow::Owned(result)
}

/// Map a driver error onto the cafe taxonomy
fn map_sqlite_error(err: rusqlite::Error) -> CafeError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return CafeError::conflict(format!("database is busy: {err}"));
            }
            ErrorCode::ConstraintViolation
                if matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                ) =>
            {
                return CafeError::unique_violation(err.to_string());
            }
            _ => {}
        }
    }

    CafeError::persistence(err.to_string())
}
