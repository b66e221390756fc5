//! Cafe - Menu-Driven Ordering Front End
//!
//! Cafe is an interactive, role-gated front end for a cafe ordering database.
//! Customers browse the menu and place orders, Managers maintain the menu and
//! change other users' roles.
//!
//! # Core Principles
//! - Parameters are always bound, never spliced into SQL
//! - Roles are re-read from the store at every authorization point
//! - Order ids are unique and dense under concurrent placement
//! - Every action error is reported and contained; only a lost terminal ends a session
//!
//! # Architecture
//! The binary is a thin wrapper: it resolves configuration, opens a [`Store`],
//! and runs a [`Session`] over the terminal. All behavior lives in this library.
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`money`] - Integer-cents monetary values
//! - [`capability`] - Roles and capability checks
//! - [`config`] - Configuration management
//! - [`engine`] - Query executor trait and engine implementations
//! - [`schema`] - Reference DDL
//! - [`auth`] - Registration and authentication
//! - [`menu`] - Menu catalog
//! - [`profile`] - Profile changes and role reassignment
//! - [`orders`] - Order placement and history
//! - [`session`] - Interactive state machine and console

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
compile_error!("enable at least one database engine feature: `postgres` or `sqlite`");

pub mod error;
pub mod money;
pub mod capability;
pub mod config;
pub mod engine;
pub mod schema;
pub mod auth;
pub mod menu;
pub mod profile;
pub mod orders;
pub mod session;

// Re-export commonly used types for convenience
pub use auth::{AuthService, Identity, User};
pub use capability::{authorize, Capability, Role};
pub use config::Settings;
pub use engine::{ConnectionConfig, DatabaseType, QueryExecutor, Row, SqlParam, Store};
pub use error::{CafeError, Result};
pub use menu::{MenuCatalog, MenuField, MenuItem, NewMenuItem};
pub use money::Money;
pub use orders::{Order, OrderProcessor, PaymentChoice};
pub use profile::{ProfileField, ProfileManager};
pub use session::{Console, ScriptedConsole, Session, SessionState, StdConsole};
