//! `SeaORM` implementation of the [`AuthService`] trait.
//!
//! Composes the credential repository and the session manager over an
//! injected [`Store`]. Maps repository failures to the public error taxonomy
//! so no store internals leak to callers.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{Config, SecurityConfig};
use crate::db::Store;
use crate::db::repositories::credential;
use crate::services::auth_service::{AuthError, AuthService, LoginResult, UserInfo};
use crate::services::session::SessionManager;

pub struct SeaOrmAuthService {
    store: Store,
    sessions: SessionManager,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(store: Store, config: &Config) -> Self {
        let sessions = SessionManager::from_config(store.clone(), &config.session);
        Self {
            store,
            sessions,
            security: config.security.clone(),
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username is required"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password is required"));
        }

        // Unknown and inactive accounts take the same path as a wrong
        // password: one dummy verification, then the generic failure.
        let Some((user, password_hash)) = self.store.find_active_admin(username).await? else {
            credential::dummy_verify(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !credential::verify_password(&password_hash, password).await? {
            return Err(AuthError::InvalidCredentials);
        }

        // Best-effort stamp; a failed update must not fail the login.
        if let Err(e) = self.store.record_login(user.id, Utc::now()).await {
            warn!(user_id = user.id, "failed to record login time: {e}");
        }

        let token = self.sessions.issue_token(user.id).await?;

        Ok(LoginResult {
            token,
            user: UserInfo {
                id: user.id,
                username: user.username,
            },
        })
    }

    async fn validate_token(&self, token: &str) -> Result<UserInfo, AuthError> {
        self.sessions.validate_token(token).await
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.revoke_token(token).await
    }

    async fn create_admin(&self, username: &str, password: &str) -> Result<UserInfo, AuthError> {
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username is required"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password is required"));
        }

        let hash =
            credential::hash_password_blocking(password.to_string(), self.security.clone()).await?;

        match self.store.create_admin_row(username, &hash).await {
            Ok(user) => {
                info!(username = %user.username, "admin account created");
                Ok(UserInfo {
                    id: user.id,
                    username: user.username,
                })
            }
            Err(e) if e.downcast_ref::<credential::DuplicateUsername>().is_some() => {
                Err(AuthError::DuplicateUsername)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::InvalidInput("new password is required"));
        }

        let Some((user, old_hash)) = self.store.find_admin_by_id(user_id).await? else {
            return Err(AuthError::NotFound);
        };

        if !credential::verify_password(&old_hash, old_password).await? {
            return Err(AuthError::InvalidOldPassword);
        }

        let new_hash =
            credential::hash_password_blocking(new_password.to_string(), self.security.clone())
                .await?;
        self.store.update_admin_password(user.id, &new_hash).await?;

        // Every outstanding token dies with the old password.
        let revoked = self.sessions.revoke_all_for_user(user.id).await?;
        info!(
            user_id = user.id,
            revoked_sessions = revoked,
            "password changed"
        );

        Ok(())
    }

    async fn has_admin(&self) -> Result<bool, AuthError> {
        let exists = self.store.has_admin().await?;
        Ok(exists)
    }
}
