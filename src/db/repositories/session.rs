use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
    SqlErr,
};

use crate::entities::sessions;

/// Marker error for a token UNIQUE-constraint violation, so the session
/// manager can regenerate and retry.
#[derive(Debug, thiserror::Error)]
#[error("session token already exists")]
pub struct TokenCollision;

pub struct SessionRepository {
    conn: DatabaseConnection,
}

impl SessionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Persist a freshly issued session. A colliding token surfaces as
    /// [`TokenCollision`]; uniqueness is decided by the UNIQUE constraint.
    pub async fn insert(
        &self,
        user_id: i32,
        token: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<sessions::Model> {
        let active = sessions::ActiveModel {
            token: Set(token.to_string()),
            user_id: Set(user_id),
            issued_at: Set(issued_at),
            expires_at: Set(expires_at),
            revoked: Set(false),
            ..Default::default()
        };

        match active.insert(&self.conn).await {
            Ok(model) => Ok(model),
            Err(e) => {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    Err(anyhow::Error::new(TokenCollision))
                } else {
                    Err(e).context("Failed to insert session")
                }
            }
        }
    }

    /// Exact-match lookup by token.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<sessions::Model>> {
        let session = sessions::Entity::find()
            .filter(sessions::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query session by token")?;

        Ok(session)
    }

    /// Mark a single session revoked. Idempotent; returns the number of rows
    /// touched.
    pub async fn revoke_by_token(&self, token: &str) -> Result<u64> {
        let result = sessions::Entity::update_many()
            .col_expr(sessions::Column::Revoked, Expr::value(true))
            .filter(sessions::Column::Token.eq(token))
            .exec(&self.conn)
            .await
            .context("Failed to revoke session")?;

        Ok(result.rows_affected)
    }

    /// Mark every session belonging to a user revoked.
    pub async fn revoke_all_for_user(&self, user_id: i32) -> Result<u64> {
        let result = sessions::Entity::update_many()
            .col_expr(sessions::Column::Revoked, Expr::value(true))
            .filter(sessions::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to revoke sessions for user")?;

        Ok(result.rows_affected)
    }

    /// Delete rows that can no longer validate (expired or revoked). Storage
    /// bounding only; validation never depends on this running.
    pub async fn purge_dead(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sessions::Entity::delete_many()
            .filter(
                Condition::any()
                    .add(sessions::Column::ExpiresAt.lt(now))
                    .add(sessions::Column::Revoked.eq(true)),
            )
            .exec(&self.conn)
            .await
            .context("Failed to purge dead sessions")?;

        Ok(result.rows_affected)
    }
}
