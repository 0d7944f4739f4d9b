use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::sessions;

pub mod migrator;
pub mod repositories;

pub use repositories::credential::AdminUser;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn credential_repo(&self) -> repositories::credential::CredentialRepository {
        repositories::credential::CredentialRepository::new(self.conn.clone())
    }

    fn session_repo(&self) -> repositories::session::SessionRepository {
        repositories::session::SessionRepository::new(self.conn.clone())
    }

    // ========== Credential Repository Methods ==========

    pub async fn find_active_admin(&self, username: &str) -> Result<Option<(AdminUser, String)>> {
        self.credential_repo()
            .find_active_by_username(username)
            .await
    }

    pub async fn find_admin_by_id(&self, id: i32) -> Result<Option<(AdminUser, String)>> {
        self.credential_repo().find_by_id(id).await
    }

    pub async fn create_admin_row(&self, username: &str, password_hash: &str) -> Result<AdminUser> {
        self.credential_repo().create(username, password_hash).await
    }

    pub async fn update_admin_password(&self, id: i32, new_hash: &str) -> Result<()> {
        self.credential_repo().update_password(id, new_hash).await
    }

    pub async fn record_login(&self, id: i32, at: DateTime<Utc>) -> Result<()> {
        self.credential_repo().record_login(id, at).await
    }

    pub async fn has_admin(&self) -> Result<bool> {
        self.credential_repo().has_any().await
    }

    // ========== Session Repository Methods ==========

    pub async fn insert_session(
        &self,
        user_id: i32,
        token: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<sessions::Model> {
        self.session_repo()
            .insert(user_id, token, issued_at, expires_at)
            .await
    }

    pub async fn find_session(&self, token: &str) -> Result<Option<sessions::Model>> {
        self.session_repo().find_by_token(token).await
    }

    pub async fn revoke_session(&self, token: &str) -> Result<u64> {
        self.session_repo().revoke_by_token(token).await
    }

    pub async fn revoke_sessions_for_user(&self, user_id: i32) -> Result<u64> {
        self.session_repo().revoke_all_for_user(user_id).await
    }

    pub async fn purge_dead_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        self.session_repo().purge_dead(now).await
    }
}
