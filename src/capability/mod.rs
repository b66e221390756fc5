//! Role-Based Capability Checks
//!
//! This module decides which operations a role may perform. It never trusts a
//! role captured earlier in the session: callers fetch the live role from the
//! store (`AuthService::current_role`) immediately before asking [`authorize`].
//!
//! # Capability Matrix
//! | Capability         | Customer | Employee | Manager |
//! |--------------------|----------|----------|---------|
//! | `BrowseMenu`       | yes      | yes      | yes     |
//! | `PlaceOrder`       | yes      | yes      | yes     |
//! | `UpdateOwnProfile` | yes      | yes      | yes     |
//! | `ManageMenu`       | no       | no       | yes     |
//! | `ChangeUserType`   | no       | no       | yes     |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CafeError, Result};

/// User role stored in `Users.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Customer,
    Employee,
    Manager,
}

impl Role {
    /// Stored representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Employee => "Employee",
            Self::Manager => "Manager",
        }
    }

    /// Check whether this role grants a capability
    #[must_use]
    pub const fn grants(&self, capability: Capability) -> bool {
        match capability {
            Capability::BrowseMenu | Capability::PlaceOrder | Capability::UpdateOwnProfile => true,
            Capability::ManageMenu | Capability::ChangeUserType => matches!(self, Self::Manager),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = CafeError;

    /// Parse a stored role
    ///
    /// `CHAR(8)` columns pad `Manager` with a trailing space, so input is trimmed
    /// and compared case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "employee" => Ok(Self::Employee),
            "manager" => Ok(Self::Manager),
            other => Err(CafeError::persistence(format!("unknown user type '{other}'"))),
        }
    }
}

/// Operation that requires an authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BrowseMenu,
    PlaceOrder,
    UpdateOwnProfile,
    ManageMenu,
    ChangeUserType,
}

impl Capability {
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::BrowseMenu => "browse the menu",
            Self::PlaceOrder => "place orders",
            Self::UpdateOwnProfile => "update a profile",
            Self::ManageMenu => "change menu items",
            Self::ChangeUserType => "change user types",
        }
    }
}

/// Authorize a capability for a role
///
/// # Returns
/// * `Ok(())` if the role grants the capability
/// * `Err(CafeError::Unauthorized)` otherwise
pub fn authorize(role: Role, capability: Capability) -> Result<()> {
    if role.grants(capability) {
        Ok(())
    } else {
        Err(CafeError::unauthorized(format!(
            "{role} users cannot {}",
            capability.describe()
        )))
    }
}
