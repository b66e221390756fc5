//! Shared helpers for the integration tests
//!
//! Each test gets its own `SQLite` file in the temp directory with the cafe
//! schema installed. The file is removed when the `TestDb` is dropped.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cafe::engine::sqlite::SqliteExecutor;
use cafe::schema::install_schema;
use cafe::{AuthService, MenuCatalog, Money, NewMenuItem, QueryExecutor, SqlParam};

pub struct TestDb {
    path: PathBuf,
}

impl TestDb {
    /// Create an empty database file with the schema installed
    pub async fn new(tag: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("cafe_{tag}_{}_{id}.db", std::process::id()));
        remove_files(&path);

        let db = Self { path };
        let executor = db.open();
        install_schema(&executor).await.expect("Failed to install schema");
        executor.close();
        db
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new connection to the database
    pub fn open(&self) -> SqliteExecutor {
        SqliteExecutor::open(&self.path, Duration::from_secs(10)).expect("Failed to open test database")
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        remove_files(&self.path);
    }
}

fn remove_files(path: &Path) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-journal"));
}

/// Register a user and give them a role
pub async fn seed_user<Q: QueryExecutor>(db: &Q, login: &str, password: &str, role: &str) {
    AuthService::new(db).register(login, password, "555-0000").await.expect("Failed to register");
    set_role(db, login, role).await;
}

/// Overwrite a user's role directly, as another session would
pub async fn set_role<Q: QueryExecutor>(db: &Q, login: &str, role: &str) {
    db.execute(
        "UPDATE Users SET type = $1 WHERE login = $2",
        &[SqlParam::text(role), SqlParam::text(login)],
    )
    .await
    .expect("Failed to set role");
}

/// Add a menu item
pub async fn seed_item<Q: QueryExecutor>(db: &Q, name: &str, price: &str, item_type: &str) {
    MenuCatalog::new(db, false)
        .add_item(&NewMenuItem {
            name: name.to_string(),
            description: String::new(),
            price: Money::parse(price).expect("Invalid price"),
            item_type: item_type.to_string(),
            image_url: String::new(),
        })
        .await
        .expect("Failed to add item");
}

/// Count rows in a table
pub async fn count_rows<Q: QueryExecutor>(db: &Q, table: &str) -> i64 {
    let rows = db
        .query(&format!("SELECT COUNT(*) FROM {table}"), &[])
        .await
        .expect("Failed to count rows");
    rows[0].integer(0, "count").expect("Count is not an integer")
}
