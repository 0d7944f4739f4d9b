use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, SqlErr,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::admin_users;

/// Well-formed Argon2id hash carrying the default cost parameters. Verified
/// against when a username lookup misses, so a miss costs the same as a
/// password mismatch.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=8192,t=3,p=1$c2FsdHNhbHRzYWx0c2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Marker error for a username UNIQUE-constraint violation.
#[derive(Debug, thiserror::Error)]
#[error("username already exists")]
pub struct DuplicateUsername;

/// Admin account data returned from the repository (without the password hash).
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: i32,
    pub username: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<admin_users::Model> for AdminUser {
    fn from(model: admin_users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            is_active: model.is_active,
            last_login: model.last_login,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct CredentialRepository {
    conn: DatabaseConnection,
}

impl CredentialRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get an active account by username, with its password hash.
    /// Inactive accounts are indistinguishable from missing ones.
    pub async fn find_active_by_username(
        &self,
        username: &str,
    ) -> Result<Option<(AdminUser, String)>> {
        let user = admin_users::Entity::find()
            .filter(admin_users::Column::Username.eq(username))
            .filter(admin_users::Column::IsActive.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query admin by username")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (AdminUser::from(u), password_hash)
        }))
    }

    /// Get an account by ID, with its password hash.
    pub async fn find_by_id(&self, id: i32) -> Result<Option<(AdminUser, String)>> {
        let user = admin_users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query admin by ID")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (AdminUser::from(u), password_hash)
        }))
    }

    /// Insert a new active account. A duplicate username surfaces as
    /// [`DuplicateUsername`], decided by the UNIQUE constraint rather than a
    /// read-then-write check.
    pub async fn create(&self, username: &str, password_hash: &str) -> Result<AdminUser> {
        let now = Utc::now();

        let active = admin_users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(AdminUser::from(model)),
            Err(e) => {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    Err(anyhow::Error::new(DuplicateUsername))
                } else {
                    Err(e).context("Failed to insert admin user")
                }
            }
        }
    }

    /// Replace the stored password hash.
    pub async fn update_password(&self, id: i32, new_hash: &str) -> Result<()> {
        let user = admin_users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query admin for password update")?
            .ok_or_else(|| anyhow::anyhow!("Admin not found: {id}"))?;

        let mut active: admin_users::ActiveModel = user.into();
        active.password_hash = Set(new_hash.to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Stamp the last successful login. Callers treat failures as non-fatal.
    pub async fn record_login(&self, id: i32, at: DateTime<Utc>) -> Result<()> {
        let user = admin_users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query admin for login stamp")?
            .ok_or_else(|| anyhow::anyhow!("Admin not found: {id}"))?;

        let mut active: admin_users::ActiveModel = user.into();
        active.last_login = Set(Some(at));
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Whether any account exists at all, active or not. Gates first-run
    /// bootstrap.
    pub async fn has_any(&self) -> Result<bool> {
        let count = admin_users::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count admin accounts")?;

        Ok(count > 0)
    }
}

/// Hash a password with Argon2id using the configured cost parameters and a
/// fresh random salt.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Hash a password on the blocking pool. Argon2 is CPU-intensive and would
/// stall the async runtime if run directly.
pub async fn hash_password_blocking(password: String, config: SecurityConfig) -> Result<String> {
    task::spawn_blocking(move || hash_password(&password, &config))
        .await
        .context("Password hashing task panicked")?
}

/// Verify a candidate password against a stored hash. The cost parameters come
/// from the hash itself; comparison is constant-time inside the verifier.
/// Note: This uses `spawn_blocking` because Argon2 verification is
/// CPU-intensive and would block the async runtime if run directly.
pub async fn verify_password(password_hash: &str, candidate: &str) -> Result<bool> {
    let password_hash = password_hash.to_owned();
    let candidate = candidate.to_owned();

    let is_valid = task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        let argon2 = Argon2::default();
        Ok::<bool, anyhow::Error>(
            argon2
                .verify_password(candidate.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")??;

    Ok(is_valid)
}

/// Burn one full verification against [`DUMMY_HASH`]. Called on the
/// unknown-username path of login so it is not cheaper than a mismatch.
pub async fn dummy_verify(candidate: &str) {
    let _ = verify_password(DUMMY_HASH, candidate).await;
}
