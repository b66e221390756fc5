//! Account Registration and Authentication
//!
//! `AuthService` creates accounts, checks credentials and re-reads a user's
//! role whenever a role-gated action is attempted. Roles are never cached:
//! a Manager demoted by another session loses access on the next check.
//!
//! Failed logins are constant-shaped: an unknown login and a wrong password
//! produce the same error after the same amount of hashing work.
//!
//! Logins are stored and looked up with surrounding whitespace removed.

pub mod password;

use crate::capability::Role;
use crate::engine::{QueryExecutor, SqlParam};
use crate::error::{CafeError, Result};

use password::Verdict;

/// Resolved `(login, role)` pair established by a successful authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub login: String,
    pub role: Role,
}

/// A user record as exposed to the session (never carries the password)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub login: String,
    pub phone: String,
    pub favorite_items: String,
    pub role: Role,
}

/// Trim a login as it is stored
///
/// # Errors
/// * `Validation` if nothing is left
pub fn normalize_login(login: &str) -> Result<&str> {
    let login = login.trim();
    if login.is_empty() {
        return Err(CafeError::validation("login cannot be empty"));
    }
    Ok(login)
}

pub struct AuthService<'a, Q> {
    db: &'a Q,
}

impl<'a, Q: QueryExecutor> AuthService<'a, Q> {
    #[must_use]
    pub const fn new(db: &'a Q) -> Self {
        Self { db }
    }

    /// Create a Customer account with empty favorites
    ///
    /// # Errors
    /// * `Validation` if login or password is empty
    /// * `DuplicateLogin` if the login is taken (also when another session wins the race)
    pub async fn register(&self, login: &str, password: &str, phone: &str) -> Result<User> {
        let login = normalize_login(login)?;
        if password.is_empty() {
            return Err(CafeError::validation("password cannot be empty"));
        }

        if self.login_exists(login).await? {
            return Err(CafeError::DuplicateLogin(login.to_string()));
        }

        let hash = password::hash_password(password)?;
        let inserted = self
            .db
            .execute(
                "INSERT INTO Users (login, password, phoneNum, favItems, type) VALUES ($1, $2, $3, '', $4)",
                &[
                    SqlParam::text(login),
                    SqlParam::Text(hash),
                    SqlParam::text(phone),
                    SqlParam::text(Role::Customer.as_str()),
                ],
            )
            .await
            .map_err(|e| match e {
                CafeError::UniqueViolation(_) => CafeError::DuplicateLogin(login.to_string()),
                other => other,
            })?;

        if inserted != 1 {
            return Err(CafeError::persistence(format!(
                "expected to insert one user, inserted {inserted}"
            )));
        }

        tracing::info!(login, "user registered");
        Ok(User {
            login: login.to_string(),
            phone: phone.to_string(),
            favorite_items: String::new(),
            role: Role::Customer,
        })
    }

    /// Check a login/password pair and resolve the user's current role
    ///
    /// A legacy cleartext password is upgraded to a hash on success.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Identity> {
        let login = login.trim();
        let rows = self
            .db
            .query(
                "SELECT password, type FROM Users WHERE login = $1",
                &[SqlParam::text(login)],
            )
            .await?;

        let stored = rows.first();
        let verdict = password::verify_password(password, stored.and_then(|row| row.get(0)));
        let Some(row) = stored.filter(|_| verdict.is_match()) else {
            tracing::info!(login, "authentication failed");
            return Err(CafeError::AuthFailure);
        };

        let role: Role = row.required(1, "type")?.parse()?;

        if verdict == Verdict::LegacyMatch {
            self.upgrade_legacy_password(login, password).await;
        }

        tracing::debug!(login, %role, "authenticated");
        Ok(Identity { login: login.to_string(), role })
    }

    /// Re-read a user's role from the store
    ///
    /// # Errors
    /// * `NotFound` if the login no longer exists
    pub async fn current_role(&self, login: &str) -> Result<Role> {
        let rows = self
            .db
            .query("SELECT type FROM Users WHERE login = $1", &[SqlParam::text(login)])
            .await?;

        match rows.first() {
            Some(row) => row.required(0, "type")?.parse(),
            None => Err(CafeError::not_found(format!("user '{login}'"))),
        }
    }

    pub async fn login_exists(&self, login: &str) -> Result<bool> {
        let rows = self
            .db
            .query("SELECT 1 FROM Users WHERE login = $1", &[SqlParam::text(login)])
            .await?;
        Ok(!rows.is_empty())
    }

    async fn upgrade_legacy_password(&self, login: &str, password: &str) {
        let upgraded = match password::hash_password(password) {
            Ok(hash) => {
                self.db
                    .execute(
                        "UPDATE Users SET password = $1 WHERE login = $2",
                        &[SqlParam::Text(hash), SqlParam::text(login)],
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        match upgraded {
            Ok(_) => tracing::info!(login, "upgraded cleartext password to hash"),
            Err(e) => tracing::warn!(login, error = %e, "failed to upgrade cleartext password"),
        }
    }
}
