//! Reference Schema
//!
//! DDL for the three tables the services read and write. Statements use
//! `CREATE TABLE IF NOT EXISTS`, so installing over an existing database is a no-op.
//!
//! # Tables
//! - `Users(login PK, password, phoneNum, favItems, type)`
//! - `Menu(itemId PK, itemName, type, price, description, imageURL)`, with item
//!   names kept unique by the `menu_item_name` index
//! - `Orders(orderid PK, login FK -> Users, paid, timeStampReceived, total)`

use crate::engine::{DatabaseType, QueryExecutor};
use crate::error::Result;

const POSTGRES_DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS Users (
        login VARCHAR(50) PRIMARY KEY,
        password TEXT NOT NULL,
        phoneNum VARCHAR(16),
        favItems TEXT,
        type VARCHAR(8) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS Menu (
        itemId SERIAL PRIMARY KEY,
        itemName VARCHAR(50) NOT NULL,
        type VARCHAR(20),
        price NUMERIC(8,2) NOT NULL CHECK (price >= 0),
        description VARCHAR(400),
        imageURL VARCHAR(256)
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS menu_item_name ON Menu (itemName)",
    "CREATE TABLE IF NOT EXISTS Orders (
        orderid INTEGER PRIMARY KEY,
        login VARCHAR(50) NOT NULL REFERENCES Users(login) ON UPDATE CASCADE,
        paid BOOLEAN NOT NULL,
        timeStampReceived TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        total NUMERIC(10,2) NOT NULL
    )",
];

const SQLITE_DDL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS Users (
        login VARCHAR(50) PRIMARY KEY,
        password TEXT NOT NULL,
        phoneNum VARCHAR(16),
        favItems TEXT,
        type VARCHAR(8) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS Menu (
        itemId INTEGER PRIMARY KEY AUTOINCREMENT,
        itemName VARCHAR(50) NOT NULL,
        type VARCHAR(20),
        price NUMERIC(8,2) NOT NULL CHECK (price >= 0),
        description VARCHAR(400),
        imageURL VARCHAR(256)
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS menu_item_name ON Menu (itemName)",
    "CREATE TABLE IF NOT EXISTS Orders (
        orderid INTEGER PRIMARY KEY,
        login VARCHAR(50) NOT NULL REFERENCES Users(login) ON UPDATE CASCADE,
        paid BOOLEAN NOT NULL,
        timeStampReceived TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        total NUMERIC(10,2) NOT NULL
    )",
];

/// DDL statements for an engine, in dependency order
#[must_use]
pub const fn statements(engine: DatabaseType) -> &'static [&'static str] {
    match engine {
        DatabaseType::Postgres => POSTGRES_DDL,
        DatabaseType::SQLite => SQLITE_DDL,
    }
}

/// Create any missing tables and indexes
pub async fn install_schema<Q: QueryExecutor>(executor: &Q) -> Result<()> {
    let engine = executor.engine();
    for statement in statements(engine) {
        executor.execute(statement, &[]).await?;
    }

    tracing::info!(%engine, "schema installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_created_after_users() {
        for engine in [DatabaseType::Postgres, DatabaseType::SQLite] {
            let ddl = statements(engine);
            let users = ddl.iter().position(|s| s.contains("TABLE IF NOT EXISTS Users")).unwrap();
            let orders = ddl.iter().position(|s| s.contains("TABLE IF NOT EXISTS Orders")).unwrap();
            assert!(users < orders, "{engine}: Orders references Users");
        }
    }

    #[test]
    fn test_menu_has_surrogate_key() {
        assert!(statements(DatabaseType::Postgres)[1].contains("itemId SERIAL PRIMARY KEY"));
        assert!(statements(DatabaseType::SQLite)[1].contains("itemId INTEGER PRIMARY KEY AUTOINCREMENT"));
    }

    #[test]
    fn test_item_names_are_unique() {
        for engine in [DatabaseType::Postgres, DatabaseType::SQLite] {
            let ddl = statements(engine);
            let menu = ddl.iter().position(|s| s.contains("TABLE IF NOT EXISTS Menu")).unwrap();
            let index = ddl
                .iter()
                .position(|s| s.contains("UNIQUE INDEX IF NOT EXISTS menu_item_name ON Menu (itemName)"))
                .unwrap();
            assert!(menu < index, "{engine}: index created after its table");
        }
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_install_is_idempotent() {
        use crate::engine::sqlite::SqliteExecutor;

        let executor = SqliteExecutor::open_in_memory().unwrap();
        install_schema(&executor).await.unwrap();
        install_schema(&executor).await.unwrap();

        let rows = executor
            .query("SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('Users', 'Menu', 'Orders')", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
    }
}
