//! Profile Management
//!
//! Users change their own login, phone number, password and favorite items;
//! Managers change other users' roles. Every call re-verifies the caller's
//! credentials against the store before writing anything.

use crate::auth::{normalize_login, password, AuthService};
use crate::capability::{authorize, Capability, Role};
use crate::engine::{QueryExecutor, SqlParam};
use crate::error::{CafeError, Result};

/// Attribute a user may change on their own account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Login,
    Phone,
    Password,
    FavoriteItems,
}

impl ProfileField {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Phone => "phone number",
            Self::Password => "password",
            Self::FavoriteItems => "favorite items",
        }
    }
}

pub struct ProfileManager<'a, Q> {
    db: &'a Q,
}

impl<'a, Q: QueryExecutor> ProfileManager<'a, Q> {
    #[must_use]
    pub const fn new(db: &'a Q) -> Self {
        Self { db }
    }

    /// Change one attribute of the caller's own account
    ///
    /// # Errors
    /// * `AuthFailure` if `(login, password)` does not currently match a user
    /// * `Validation` for an empty login or password
    /// * `DuplicateLogin` when renaming onto a taken login
    pub async fn update_own_field(
        &self,
        login: &str,
        password: &str,
        field: ProfileField,
        value: &str,
    ) -> Result<()> {
        let identity = AuthService::new(self.db).authenticate(login, password).await?;
        authorize(identity.role, Capability::UpdateOwnProfile)?;

        let (sql, param) = match field {
            ProfileField::Login => {
                let new_login = normalize_login(value)?;
                if new_login != identity.login && AuthService::new(self.db).login_exists(new_login).await? {
                    return Err(CafeError::DuplicateLogin(new_login.to_string()));
                }
                ("UPDATE Users SET login = $1 WHERE login = $2", SqlParam::text(new_login))
            }
            ProfileField::Phone => ("UPDATE Users SET phoneNum = $1 WHERE login = $2", SqlParam::text(value)),
            ProfileField::Password => {
                if value.is_empty() {
                    return Err(CafeError::validation("password cannot be empty"));
                }
                (
                    "UPDATE Users SET password = $1 WHERE login = $2",
                    SqlParam::Text(password::hash_password(value)?),
                )
            }
            ProfileField::FavoriteItems => {
                ("UPDATE Users SET favItems = $1 WHERE login = $2", SqlParam::text(value))
            }
        };

        let updated = self
            .db
            .execute(sql, &[param, SqlParam::text(identity.login.as_str())])
            .await
            .map_err(|e| match (field, e) {
                (ProfileField::Login, CafeError::UniqueViolation(_)) => {
                    CafeError::DuplicateLogin(value.trim().to_string())
                }
                (_, other) => other,
            })?;

        if updated == 0 {
            return Err(CafeError::not_found(format!("user '{login}'")));
        }

        tracing::info!(login, field = field.label(), "profile updated");
        Ok(())
    }

    /// Set another user's role
    ///
    /// The caller must currently be a Manager, re-verified from
    /// `(manager_login, manager_password)`. A Manager may change their own role.
    ///
    /// # Errors
    /// * `Unauthorized` if the credentials are wrong or the caller is not a Manager
    /// * `NotFound` if `target_login` does not exist
    pub async fn change_user_type(
        &self,
        manager_login: &str,
        manager_password: &str,
        target_login: &str,
        new_role: Role,
    ) -> Result<()> {
        let identity = match AuthService::new(self.db).authenticate(manager_login, manager_password).await {
            Ok(identity) => identity,
            Err(CafeError::AuthFailure) => {
                return Err(CafeError::unauthorized("manager credentials could not be verified"));
            }
            Err(e) => return Err(e),
        };
        authorize(identity.role, Capability::ChangeUserType)?;

        let updated = self
            .db
            .execute(
                "UPDATE Users SET type = $1 WHERE login = $2",
                &[SqlParam::text(new_role.as_str()), SqlParam::text(target_login)],
            )
            .await?;

        if updated == 0 {
            return Err(CafeError::not_found(format!("user '{target_login}'")));
        }

        tracing::info!(manager = manager_login, target = target_login, role = %new_role, "user type changed");
        Ok(())
    }
}
