//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout the cafe front end.
//! Every error maps to a stable error code and renders as a single line that
//! the session controller can show to the user.
//!
//! # Error Categories
//! - `Validation`: Malformed numeric input or an empty required field
//! - `AuthFailure`: Login/password pair does not match a user
//! - `Unauthorized`: The caller's live role does not grant the operation
//! - `NotFound`: No matching user, menu item or order
//! - `DuplicateLogin` / `DuplicateItem`: Uniqueness rules on users and menu items
//! - `AmbiguousTarget`: A name matches more than one menu item
//! - `UniqueViolation`: A write collided with an existing key (retryable)
//! - `Conflict`: The store was busy or could not serialize the write (retryable)
//! - `Persistence`: Any other store failure
//! - `ConnectionFailed`: The initial connection could not be established (fatal)
//! - `Config`: Configuration file or environment problems
//! - `Terminal` / `InputClosed`: The interactive input stream failed or ended

use thiserror::Error;

/// Main error type for cafe operations
#[derive(Error, Debug)]
pub enum CafeError {
    /// Malformed input or missing required value
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Credentials did not match; deliberately silent about which part was wrong
    #[error("Invalid login or password")]
    AuthFailure,

    /// Role check failed
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// No matching record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Login already taken
    #[error("Login '{0}' is already taken")]
    DuplicateLogin(String),

    /// Menu item name already taken
    #[error("A menu item named '{0}' already exists")]
    DuplicateItem(String),

    /// Name matches several menu items
    #[error("'{0}' matches more than one menu item")]
    AmbiguousTarget(String),

    /// Write collided with an existing key, possibly one another session just wrote
    #[error("Duplicate key: {0}")]
    UniqueViolation(String),

    /// Store was locked or could not serialize the write
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Store call failed
    #[error("Database error: {0}")]
    Persistence(String),

    /// Database connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Configuration error (file not found, invalid JSON, missing env var)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading from or writing to the terminal failed
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Input stream reached end of file
    #[error("Input closed")]
    InputClosed,
}

impl CafeError {
    /// Convert error to a stable error code string
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AuthFailure => "AUTH_FAILURE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::DuplicateLogin(_) => "DUPLICATE_LOGIN",
            Self::DuplicateItem(_) => "DUPLICATE_ITEM",
            Self::AmbiguousTarget(_) => "AMBIGUOUS_TARGET",
            Self::UniqueViolation(_) => "UNIQUE_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Terminal(_) => "TERMINAL_ERROR",
            Self::InputClosed => "INPUT_CLOSED",
        }
    }

    /// Get human-readable error message (safe to print, no credentials)
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether the operation may succeed if simply attempted again
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::UniqueViolation(_) | Self::Conflict(_))
    }

    /// Whether the error means the interactive session cannot continue
    ///
    /// Everything else is contained at the sub-menu that started the action.
    #[must_use]
    pub const fn ends_session(&self) -> bool {
        matches!(self, Self::InputClosed | Self::Terminal(_))
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a unique-key violation error
    pub fn unique_violation(message: impl Into<String>) -> Self {
        Self::UniqueViolation(message.into())
    }

    /// Create a write-conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a terminal error
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal(message.into())
    }
}

/// Result type alias for cafe operations
pub type Result<T> = std::result::Result<T, CafeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CafeError::validation("test").error_code(), "VALIDATION_ERROR");
        assert_eq!(CafeError::AuthFailure.error_code(), "AUTH_FAILURE");
        assert_eq!(CafeError::unauthorized("test").error_code(), "UNAUTHORIZED");
        assert_eq!(CafeError::not_found("test").error_code(), "NOT_FOUND");
        assert_eq!(CafeError::DuplicateLogin("a".into()).error_code(), "DUPLICATE_LOGIN");
        assert_eq!(CafeError::DuplicateItem("a".into()).error_code(), "DUPLICATE_ITEM");
        assert_eq!(CafeError::AmbiguousTarget("a".into()).error_code(), "AMBIGUOUS_TARGET");
        assert_eq!(CafeError::unique_violation("test").error_code(), "UNIQUE_VIOLATION");
        assert_eq!(CafeError::conflict("test").error_code(), "CONFLICT");
        assert_eq!(CafeError::persistence("test").error_code(), "PERSISTENCE_ERROR");
        assert_eq!(CafeError::connection_failed("test").error_code(), "CONNECTION_FAILED");
        assert_eq!(CafeError::config_error("test").error_code(), "CONFIG_ERROR");
        assert_eq!(CafeError::terminal("test").error_code(), "TERMINAL_ERROR");
        assert_eq!(CafeError::InputClosed.error_code(), "INPUT_CLOSED");
    }

    #[test]
    fn test_error_messages() {
        let err = CafeError::DuplicateLogin("alice".into());
        assert!(err.message().contains("alice"));

        let err = CafeError::AmbiguousTarget("Latte".into());
        assert!(err.message().contains("Latte"));
        assert!(err.message().contains("more than one"));

        // Must not leak which half of the credentials was wrong
        assert_eq!(CafeError::AuthFailure.message(), "Invalid login or password");
    }

    #[test]
    fn test_retryable_and_session_ending() {
        assert!(CafeError::conflict("busy").is_retryable());
        assert!(CafeError::unique_violation("dup").is_retryable());
        assert!(!CafeError::persistence("boom").is_retryable());

        assert!(CafeError::InputClosed.ends_session());
        assert!(CafeError::terminal("broken pipe").ends_session());
        assert!(!CafeError::AuthFailure.ends_session());
        assert!(!CafeError::unauthorized("x").ends_session());
    }
}
