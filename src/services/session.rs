//! Session token lifecycle: minting, validation, revocation.
//!
//! The only place token material is generated. Tokens are opaque bearer
//! strings resolved by store lookup; expiry is checked lazily at validation
//! time, and an optional [`SessionManager::purge_expired`] sweep bounds
//! storage without affecting correctness.

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::db::Store;
use crate::db::repositories::session::TokenCollision;
use crate::services::auth_service::{AuthError, UserInfo};

/// Raw entropy per token: 32 bytes, 256 bits.
const TOKEN_BYTES: usize = 32;

/// A fresh token colliding with a stored one is astronomically unlikely; the
/// retry bound exists so a broken RNG cannot spin forever.
const ISSUE_ATTEMPTS: usize = 3;

pub struct SessionManager {
    store: Store,
    ttl: Duration,
}

impl SessionManager {
    #[must_use]
    pub const fn new(store: Store, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    #[must_use]
    pub fn from_config(store: Store, config: &SessionConfig) -> Self {
        Self::new(store, Duration::hours(i64::from(config.ttl_hours)))
    }

    /// Mint a token for the given account and persist its session record.
    pub async fn issue_token(&self, user_id: i32) -> Result<String, AuthError> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.ttl;

        for _ in 0..ISSUE_ATTEMPTS {
            let token = generate_token();

            match self
                .store
                .insert_session(user_id, &token, issued_at, expires_at)
                .await
            {
                Ok(_) => return Ok(token),
                Err(e) if e.downcast_ref::<TokenCollision>().is_some() => {
                    debug!(user_id, "token collision on issue, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::Store(
            "token generation kept colliding".to_string(),
        ))
    }

    /// Resolve a token to the owning account via a real store lookup.
    pub async fn validate_token(&self, token: &str) -> Result<UserInfo, AuthError> {
        if token.is_empty() {
            return Err(AuthError::TokenInvalid);
        }

        let Some(session) = self.store.find_session(token).await? else {
            debug!("token validation miss");
            return Err(AuthError::TokenInvalid);
        };

        if Utc::now() > session.expires_at {
            return Err(AuthError::TokenExpired);
        }

        if session.revoked {
            return Err(AuthError::TokenRevoked);
        }

        // The session row outliving its account means the account was deleted;
        // the token is no longer good for anything.
        let Some((user, _)) = self.store.find_admin_by_id(session.user_id).await? else {
            return Err(AuthError::TokenInvalid);
        };

        Ok(UserInfo {
            id: user.id,
            username: user.username,
        })
    }

    /// Revoke a single token. Idempotent; unknown tokens are a no-op.
    pub async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        self.store.revoke_session(token).await?;
        Ok(())
    }

    /// Revoke every session a user holds. Returns the number revoked.
    pub async fn revoke_all_for_user(&self, user_id: i32) -> Result<u64, AuthError> {
        let revoked = self.store.revoke_sessions_for_user(user_id).await?;
        Ok(revoked)
    }

    /// Delete expired and revoked rows. Safe to skip entirely; validation is
    /// lazy and never depends on the sweep.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let purged = self.store.purge_dead_sessions(Utc::now()).await?;
        if purged > 0 {
            info!(purged, "purged dead sessions");
        }
        Ok(purged)
    }
}

/// Generate a token: 32 bytes from the thread-local CSPRNG, hex-encoded to a
/// 64-char URL-safe printable string.
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; TOKEN_BYTES] = rng.random();

    bytes
        .iter()
        .fold(String::with_capacity(TOKEN_BYTES * 2), |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
}
