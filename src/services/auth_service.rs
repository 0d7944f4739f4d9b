//! Domain service for operator authentication.
//!
//! Handles login, session token issuance and validation, password changes,
//! and the first-run bootstrap check.

use serde::Serialize;
use thiserror::Error;

/// Errors specific to authentication operations.
///
/// Unknown usernames, inactive accounts, and wrong passwords all collapse
/// into [`AuthError::InvalidCredentials`] so callers cannot enumerate
/// accounts. Token failures stay specific; they drive internal flow control
/// and are not shown verbatim to end users.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("username already exists")]
    DuplicateUsername,

    #[error("account not found")]
    NotFound,

    #[error("invalid old password")]
    InvalidOldPassword,

    #[error("invalid session token")]
    TokenInvalid,

    #[error("session token expired")]
    TokenExpired,

    #[error("session token revoked")]
    TokenRevoked,

    #[error("store unavailable: {0}")]
    Store(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Public identity of an admin account. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
}

/// Successful login outcome: the bearer token and the account it binds.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: UserInfo,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and issues a fresh session token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for every unknown-account,
    /// inactive-account, and wrong-password outcome, indistinguishably.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Resolves a bearer token to the owning account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenInvalid`], [`AuthError::TokenExpired`], or
    /// [`AuthError::TokenRevoked`] with the specific reason.
    async fn validate_token(&self, token: &str) -> Result<UserInfo, AuthError>;

    /// Revokes the presented token. Idempotent.
    async fn logout(&self, token: &str) -> Result<(), AuthError>;

    /// Creates a new active admin account.
    ///
    /// Callers gate this behind [`AuthService::has_admin`] for first-run
    /// bootstrap; the operation itself is not single-use.
    async fn create_admin(&self, username: &str, password: &str) -> Result<UserInfo, AuthError>;

    /// Changes a password after re-verifying the old one, then revokes every
    /// session the account holds.
    async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Whether any admin account exists yet.
    async fn has_admin(&self) -> Result<bool, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_map_to_store() {
        let db_err = sea_orm::DbErr::Custom("test".to_string());
        let auth_err: AuthError = db_err.into();
        assert!(matches!(auth_err, AuthError::Store(_)));
    }

    #[test]
    fn generic_login_failure_is_a_single_message() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid username or password"
        );
    }
}
