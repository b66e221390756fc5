//! `PostgreSQL` Database Engine Implementation
//!
//! This module implements the `QueryExecutor` trait for `PostgreSQL` databases.
//!
//! # Features
//! - Client-server connections via TCP
//! - One long-lived connection per session
//! - Parameters bound with the types the server infers for each placeholder
//!
//! # Implementation Notes
//! - Uses `tokio-postgres` (async driver, requires tokio runtime)
//! - BYTEA data is Base64-encoded
//! - Timeouts enforced via `tokio::time::timeout`; a timed-out statement is
//!   cancelled on the server before the error is returned
//! - Unique violations and serialization failures are both retryable, but
//!   reported as different error kinds

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{CancelToken, Client, Config, NoTls, Statement};

use crate::engine::{ConnectionConfig, DatabaseType, QueryExecutor, Row, SqlParam};
use crate::error::{CafeError, Result};

/// `PostgreSQL` executor over a single client connection
pub struct PostgresExecutor {
    client: Client,
    cancel_token: CancelToken,
    connection: JoinHandle<()>,
    timeout: Duration,
}

type BoxedParam = Box<dyn ToSql + Sync + Send>;

impl PostgresExecutor {
    /// Connect using the given config
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        // Validate config is for PostgreSQL
        if config.engine != DatabaseType::Postgres {
            return Err(CafeError::connection_failed(format!(
                "Expected PostgreSQL engine, got {}",
                config.engine
            )));
        }

        let pg_config = build_pg_config(config)?;

        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            CafeError::connection_failed(format!("Failed to connect to PostgreSQL: {e}"))
        })?;

        // Note: Connection errors are not logged with their config to prevent credential leakage
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "PostgreSQL connection task ended with an error");
            }
        });

        let cancel_token = client.cancel_token();
        tracing::debug!(
            host = config.host.as_deref().unwrap_or_default(),
            database = config.database.as_deref().unwrap_or_default(),
            "connected to PostgreSQL"
        );

        Ok(Self { client, cancel_token, connection, timeout: config.timeout() })
    }

    /// Close the connection and wait for the connection task to finish
    pub async fn close(self) {
        drop(self.client);
        if let Err(e) = self.connection.await {
            tracing::warn!(error = %e, "PostgreSQL connection task did not shut down cleanly");
        }
    }

    /// Run a statement future under the configured timeout
    async fn with_timeout<T>(
        &self,
        sql: &str,
        work: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                if let Err(e) = self.cancel_token.cancel_query(NoTls).await {
                    tracing::warn!(error = %e, "failed to cancel timed-out statement");
                }
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, sql, "statement timed out");
                Err(CafeError::persistence(format!(
                    "Statement exceeded timeout of {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }

    async fn prepare(&self, sql: &str, params: &[SqlParam]) -> Result<(Statement, Vec<BoxedParam>)> {
        let stmt = self.client.prepare(sql).await.map_err(map_pg_error)?;

        if stmt.params().len() != params.len() {
            return Err(CafeError::persistence(format!(
                "statement expects {} parameters, got {}",
                stmt.params().len(),
                params.len()
            )));
        }

        let bound = stmt
            .params()
            .iter()
            .zip(params)
            .map(|(ty, param)| bind_param(ty, param))
            .collect::<Result<Vec<_>>>()?;

        Ok((stmt, bound))
    }
}

impl QueryExecutor for PostgresExecutor {
    fn engine(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        self.with_timeout(sql, async {
            let (stmt, bound) = self.prepare(sql, params).await?;
            let refs = param_refs(&bound);
            self.client.execute(&stmt, &refs).await.map_err(map_pg_error)
        })
        .await
    }

    async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>> {
        self.with_timeout(sql, async {
            let (stmt, bound) = self.prepare(sql, params).await?;
            let refs = param_refs(&bound);
            let rows = self.client.query(&stmt, &refs).await.map_err(map_pg_error)?;

            rows.iter()
                .map(|row| {
                    (0..row.len())
                        .map(|idx| postgres_value_to_text(row, idx))
                        .collect::<Result<Vec<_>>>()
                        .map(Row::new)
                })
                .collect()
        })
        .await
    }
}

/// Build `PostgreSQL` connection config from `ConnectionConfig`
fn build_pg_config(config: &ConnectionConfig) -> Result<Config> {
    let host = config
        .host
        .as_ref()
        .ok_or_else(|| CafeError::connection_failed("PostgreSQL requires 'host' parameter"))?;

    let port = config
        .port
        .ok_or_else(|| CafeError::connection_failed("PostgreSQL requires 'port' parameter"))?;

    let user = config
        .user
        .as_ref()
        .ok_or_else(|| CafeError::connection_failed("PostgreSQL requires 'user' parameter"))?;

    let database = config
        .database
        .as_ref()
        .ok_or_else(|| CafeError::connection_failed("PostgreSQL requires 'database' parameter"))?;

    let mut pg_config = Config::new();
    pg_config
        .host(host)
        .port(port)
        .user(user)
        .dbname(database)
        .connect_timeout(config.timeout());

    // Blank password means trust/peer authentication
    if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
        pg_config.password(password);
    }

    Ok(pg_config)
}

/// Convert a parameter to the Rust type the server expects for its placeholder
fn bind_param(ty: &Type, param: &SqlParam) -> Result<BoxedParam> {
    let mismatch = || {
        CafeError::persistence(format!("cannot bind {param:?} to a parameter of type {}", ty.name()))
    };

    let boxed: BoxedParam = match (param, ty) {
        (SqlParam::Integer(i), &Type::INT2) => {
            Box::new(i16::try_from(*i).map_err(|_| mismatch())?)
        }
        (SqlParam::Integer(i), &Type::INT4) => {
            Box::new(i32::try_from(*i).map_err(|_| mismatch())?)
        }
        (SqlParam::Integer(i), &Type::INT8) => Box::new(*i),
        (SqlParam::Integer(i), _) => Box::new(i.to_string()),
        (SqlParam::Bool(b), &Type::BOOL) => Box::new(*b),
        (SqlParam::Bool(b), _) => Box::new(b.to_string()),
        (SqlParam::Text(s), &Type::INT2 | &Type::INT4 | &Type::INT8 | &Type::BOOL) => {
            return Err(CafeError::persistence(format!(
                "cannot bind text '{s}' to a parameter of type {}",
                ty.name()
            )));
        }
        (SqlParam::Text(s), _) => Box::new(s.clone()),
    };

    Ok(boxed)
}

fn param_refs(bound: &[BoxedParam]) -> Vec<&(dyn ToSql + Sync)> {
    bound.iter().map(|b| b.as_ref() as &(dyn ToSql + Sync)).collect()
}

/// Map a driver error onto the cafe taxonomy
fn map_pg_error(err: tokio_postgres::Error) -> CafeError {
    match err.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => CafeError::unique_violation(err.to_string()),
        Some(code)
            if *code == SqlState::T_R_SERIALIZATION_FAILURE || *code == SqlState::T_R_DEADLOCK_DETECTED =>
        {
            CafeError::conflict(err.to_string())
        }
        _ => match err.as_db_error() {
            Some(db) => CafeError::persistence(db.message().to_string()),
            None => CafeError::persistence(err.to_string()),
        },
    }
}

/// Convert `PostgreSQL` value to text
fn postgres_value_to_text(row: &tokio_postgres::Row, idx: usize) -> Result<Option<String>> {
    let col_type = row.columns()[idx].type_();
    let read_err = |e: tokio_postgres::Error| {
        CafeError::persistence(format!(
            "Failed to read column {idx} of type '{}': {e}",
            col_type.name()
        ))
    };

    let value = match *col_type {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map_err(read_err)?.map(|v| v.to_string()),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).map_err(read_err)?.map(|v| v.to_string()),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).map_err(read_err)?.map(|v| v.to_string()),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map_err(read_err)?.map(|v| v.to_string()),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx).map_err(read_err)?.map(|v| v.to_string()),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map_err(read_err)?.map(|v| v.to_string()),

        Type::TIMESTAMP => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map_err(read_err)?
            .map(|v| v.format("%Y-%m-%d %H:%M:%S").to_string()),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map_err(read_err)?
            .map(|v| v.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()),

        // BYTEA (binary data) - encode as Base64
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx).map_err(read_err)?.map(|v| {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.encode(v)
        }),

        // VARCHAR, TEXT, BPCHAR, NAME and anything else the driver can read as text
        _ => row.try_get::<_, Option<String>>(idx).map_err(read_err)?,
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: Tests marked #[ignore] require a running PostgreSQL instance with an
    // empty `cafe_test` database:
    // CAFE_PG_USER=postgres cargo test --features postgres -- --ignored

    fn live_config() -> ConnectionConfig {
        let user = std::env::var("CAFE_PG_USER").unwrap_or_else(|_| "postgres".to_string());
        let password = std::env::var("CAFE_DB_PASSWORD").unwrap_or_default();
        ConnectionConfig::postgres("localhost".to_string(), 5432, user, password, "cafe_test".to_string())
            .with_timeout_ms(2_000)
    }

    #[test]
    fn test_build_config_with_blank_password() {
        let config = ConnectionConfig::postgres(
            "localhost".to_string(),
            5432,
            "postgres".to_string(),
            String::new(),
            "cafe".to_string(),
        );

        let pg_config = build_pg_config(&config).unwrap();
        assert_eq!(pg_config.get_user(), Some("postgres"));
        assert_eq!(pg_config.get_dbname(), Some("cafe"));
        assert!(pg_config.get_password().is_none());
    }

    #[test]
    fn test_missing_database_error() {
        let mut config = ConnectionConfig::postgres(
            "localhost".to_string(),
            5432,
            "postgres".to_string(),
            String::new(),
            "cafe".to_string(),
        );
        config.database = None;

        let error = build_pg_config(&config).unwrap_err();
        assert!(error.message().contains("PostgreSQL requires 'database' parameter"));
    }

    #[test]
    fn test_bind_integer_to_expected_width() {
        assert!(bind_param(&Type::INT4, &SqlParam::Integer(7)).is_ok());
        assert!(bind_param(&Type::INT2, &SqlParam::Integer(40_000)).is_err());
        assert!(bind_param(&Type::INT8, &SqlParam::Integer(i64::MAX)).is_ok());
        assert!(bind_param(&Type::TEXT, &SqlParam::Integer(3)).is_ok());
        assert!(bind_param(&Type::INT4, &SqlParam::text("seven")).is_err());
    }

    #[tokio::test]
    async fn test_connect_wrong_engine() {
        let mut config = live_config();
        config.engine = DatabaseType::SQLite;

        let result = PostgresExecutor::connect(&config).await;
        assert!(result.is_err());
        assert!(result.err().unwrap().message().contains("Expected PostgreSQL engine"));
    }

    #[tokio::test]
    async fn test_connect_missing_host() {
        let mut config = live_config();
        config.host = None;

        let result = PostgresExecutor::connect(&config).await;
        assert!(result.is_err());
        assert!(result.err().unwrap().message().contains("PostgreSQL requires 'host' parameter"));
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance"]
    async fn test_query_renders_values_as_text() {
        let executor = PostgresExecutor::connect(&live_config()).await.unwrap();

        let rows = executor
            .query(
                "SELECT 1::int4, CAST($1 AS BOOLEAN), CAST($2 AS TEXT), NULL::int8, CAST(CAST('3.50' AS NUMERIC) AS TEXT)",
                &[SqlParam::Bool(true), SqlParam::text("Latte")],
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some("1"));
        assert_eq!(rows[0].get(1), Some("true"));
        assert_eq!(rows[0].get(2), Some("Latte"));
        assert_eq!(rows[0].get(3), None);
        assert_eq!(rows[0].get(4), Some("3.50"));

        executor.close().await;
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance"]
    async fn test_statement_timeout_is_cancelled() {
        let config = live_config().with_timeout_ms(200);
        let executor = PostgresExecutor::connect(&config).await.unwrap();

        let err = executor.query("SELECT pg_sleep(5)", &[]).await.unwrap_err();
        assert!(err.message().contains("timeout"));

        // Connection is still usable after cancellation
        let rows = executor.query("SELECT 1::int8", &[]).await.unwrap();
        assert_eq!(rows[0].get(0), Some("1"));

        executor.close().await;
    }
}
