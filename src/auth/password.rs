//! Password hashing
//!
//! Stored passwords are Argon2 PHC strings. Rows written before hashing was
//! introduced hold the cleartext password; those still verify, and the caller
//! is told to upgrade them.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
    Argon2, PasswordHasher,
};
use password_hash::rand_core::OsRng;

use crate::error::{CafeError, Result};

/// Well-formed hash that no password matches, verified when a login is unknown
const DUMMY_HASH: &str = concat!(
    "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHRzYWx0$",
    "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
);

/// Outcome of checking a candidate password against a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Mismatch,
    Match,
    /// Matched a cleartext value that should be rehashed
    LegacyMatch,
}

impl Verdict {
    #[must_use]
    pub const fn is_match(self) -> bool {
        matches!(self, Self::Match | Self::LegacyMatch)
    }
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CafeError::persistence(format!("Failed to hash password: {e}")))
}

/// Check a candidate password against the stored value (`None` when the login is unknown)
pub fn verify_password(candidate: &str, stored: Option<&str>) -> Verdict {
    match stored {
        Some(stored) if is_phc_hash(stored) => {
            if verify_hash(candidate, stored) {
                Verdict::Match
            } else {
                Verdict::Mismatch
            }
        }
        Some(stored) => {
            // Spend the same work as a real verification
            verify_hash(candidate, DUMMY_HASH);
            if stored == candidate {
                Verdict::LegacyMatch
            } else {
                Verdict::Mismatch
            }
        }
        None => {
            verify_hash(candidate, DUMMY_HASH);
            Verdict::Mismatch
        }
    }
}

fn is_phc_hash(stored: &str) -> bool {
    stored.starts_with("$argon2")
}

fn verify_hash(candidate: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default().verify_password(candidate.as_bytes(), &parsed).is_ok()
}
