//! End-to-end tests for the credential and session token lifecycle.

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use opsgate::config::Config;
use opsgate::db::Store;
use opsgate::entities::admin_users;
use opsgate::services::{AuthError, AuthService, SeaOrmAuthService, SessionManager};

async fn spawn_store() -> Store {
    let db_path = std::env::temp_dir().join(format!("opsgate-test-{}.db", uuid::Uuid::new_v4()));

    Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to create test store")
}

fn auth_service(store: Store) -> SeaOrmAuthService {
    SeaOrmAuthService::new(store, &Config::default())
}

async fn deactivate(store: &Store, username: &str) {
    let user = admin_users::Entity::find()
        .filter(admin_users::Column::Username.eq(username))
        .one(&store.conn)
        .await
        .expect("query failed")
        .expect("user missing");

    let mut active: admin_users::ActiveModel = user.into();
    active.is_active = Set(false);
    active.update(&store.conn).await.expect("update failed");
}

#[tokio::test]
async fn create_admin_then_login_round_trips() {
    let store = spawn_store().await;
    let auth = auth_service(store.clone());

    assert!(!auth.has_admin().await.unwrap());

    let created = auth.create_admin("admin", "hunter2hunter2").await.unwrap();
    assert_eq!(created.username, "admin");
    assert!(auth.has_admin().await.unwrap());

    let login = auth.login("admin", "hunter2hunter2").await.unwrap();
    assert_eq!(login.user.username, "admin");
    assert_eq!(login.token.len(), 64);

    let resolved = auth.validate_token(&login.token).await.unwrap();
    assert_eq!(resolved.username, "admin");
    assert_eq!(resolved.id, created.id);

    // Successful login stamps last_login.
    let (user, _) = store
        .find_admin_by_id(created.id)
        .await
        .unwrap()
        .expect("account missing");
    assert!(user.last_login.is_some());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let store = spawn_store().await;
    let auth = auth_service(store.clone());

    auth.create_admin("admin", "correct-password").await.unwrap();
    auth.create_admin("dormant", "correct-password").await.unwrap();
    deactivate(&store, "dormant").await;

    let wrong_password = auth.login("admin", "wrong-password").await.unwrap_err();
    let unknown_user = auth.login("nobody", "correct-password").await.unwrap_err();
    let inactive_user = auth.login("dormant", "correct-password").await.unwrap_err();

    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert!(matches!(unknown_user, AuthError::InvalidCredentials));
    assert!(matches!(inactive_user, AuthError::InvalidCredentials));

    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    assert_eq!(unknown_user.to_string(), inactive_user.to_string());
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let store = spawn_store().await;
    let auth = auth_service(store);

    auth.create_admin("admin", "first-password").await.unwrap();

    let err = auth.create_admin("admin", "other-password").await.unwrap_err();
    assert!(matches!(err, AuthError::DuplicateUsername));

    // The original account still authenticates.
    assert!(auth.login("admin", "first-password").await.is_ok());
}

#[tokio::test]
async fn empty_input_is_rejected() {
    let store = spawn_store().await;
    let auth = auth_service(store);

    assert!(matches!(
        auth.create_admin("", "password").await.unwrap_err(),
        AuthError::InvalidInput(_)
    ));
    assert!(matches!(
        auth.create_admin("admin", "").await.unwrap_err(),
        AuthError::InvalidInput(_)
    ));
    assert!(matches!(
        auth.login("", "password").await.unwrap_err(),
        AuthError::InvalidInput(_)
    ));
}

#[tokio::test]
async fn token_validation_failures_are_specific() {
    let store = spawn_store().await;
    let auth = auth_service(store.clone());

    let user = auth.create_admin("admin", "hunter2hunter2").await.unwrap();

    assert!(matches!(
        auth.validate_token("").await.unwrap_err(),
        AuthError::TokenInvalid
    ));
    assert!(matches!(
        auth.validate_token("garbage").await.unwrap_err(),
        AuthError::TokenInvalid
    ));

    // A session whose validity window has passed fails as expired.
    let expired_token = opsgate::services::session::generate_token();
    let now = Utc::now();
    store
        .insert_session(
            user.id,
            &expired_token,
            now - Duration::hours(48),
            now - Duration::hours(24),
        )
        .await
        .unwrap();
    assert!(matches!(
        auth.validate_token(&expired_token).await.unwrap_err(),
        AuthError::TokenExpired
    ));

    // A logged-out session fails as revoked.
    let login = auth.login("admin", "hunter2hunter2").await.unwrap();
    auth.logout(&login.token).await.unwrap();
    assert!(matches!(
        auth.validate_token(&login.token).await.unwrap_err(),
        AuthError::TokenRevoked
    ));
}

#[tokio::test]
async fn each_login_issues_a_fresh_session() {
    let store = spawn_store().await;
    let auth = auth_service(store);

    auth.create_admin("admin", "hunter2hunter2").await.unwrap();

    let first = auth.login("admin", "hunter2hunter2").await.unwrap();
    let second = auth.login("admin", "hunter2hunter2").await.unwrap();
    assert_ne!(first.token, second.token);

    // Logging out one session leaves the other valid.
    auth.logout(&first.token).await.unwrap();
    assert!(auth.validate_token(&first.token).await.is_err());
    assert!(auth.validate_token(&second.token).await.is_ok());
}

#[tokio::test]
async fn change_password_with_wrong_old_password_changes_nothing() {
    let store = spawn_store().await;
    let auth = auth_service(store);

    let user = auth.create_admin("admin", "old-password").await.unwrap();
    let login = auth.login("admin", "old-password").await.unwrap();

    let err = auth
        .change_password(user.id, "not-the-old-password", "new-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOldPassword));

    // Stored hash untouched, sessions untouched.
    assert!(auth.login("admin", "old-password").await.is_ok());
    assert!(auth.validate_token(&login.token).await.is_ok());
}

#[tokio::test]
async fn change_password_revokes_every_session() {
    let store = spawn_store().await;
    let auth = auth_service(store);

    let user = auth.create_admin("admin", "old-password").await.unwrap();
    let first = auth.login("admin", "old-password").await.unwrap();
    let second = auth.login("admin", "old-password").await.unwrap();

    auth.change_password(user.id, "old-password", "new-password")
        .await
        .unwrap();

    let old_login = auth.login("admin", "old-password").await.unwrap_err();
    assert!(matches!(old_login, AuthError::InvalidCredentials));
    assert!(auth.login("admin", "new-password").await.is_ok());

    assert!(matches!(
        auth.validate_token(&first.token).await.unwrap_err(),
        AuthError::TokenRevoked
    ));
    assert!(matches!(
        auth.validate_token(&second.token).await.unwrap_err(),
        AuthError::TokenRevoked
    ));
}

#[tokio::test]
async fn change_password_for_missing_account_is_not_found() {
    let store = spawn_store().await;
    let auth = auth_service(store);

    let err = auth
        .change_password(4242, "whatever", "new-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));
}

#[tokio::test]
async fn purge_removes_only_dead_sessions() {
    let store = spawn_store().await;
    let auth = auth_service(store.clone());
    let sessions = SessionManager::from_config(store.clone(), &Config::default().session);

    let user = auth.create_admin("admin", "hunter2hunter2").await.unwrap();

    let live = auth.login("admin", "hunter2hunter2").await.unwrap();
    let revoked = auth.login("admin", "hunter2hunter2").await.unwrap();
    auth.logout(&revoked.token).await.unwrap();

    let expired_token = opsgate::services::session::generate_token();
    let now = Utc::now();
    store
        .insert_session(
            user.id,
            &expired_token,
            now - Duration::hours(2),
            now - Duration::hours(1),
        )
        .await
        .unwrap();

    let purged = sessions.purge_expired().await.unwrap();
    assert_eq!(purged, 2);

    assert!(auth.validate_token(&live.token).await.is_ok());
    assert!(store.find_session(&expired_token).await.unwrap().is_none());
    assert!(store.find_session(&revoked.token).await.unwrap().is_none());
}

#[tokio::test]
async fn multiple_admins_after_bootstrap() {
    let store = spawn_store().await;
    let auth = auth_service(store);

    assert!(!auth.has_admin().await.unwrap());
    auth.create_admin("first", "first-password").await.unwrap();
    assert!(auth.has_admin().await.unwrap());

    // The bootstrap gate is an existence check, not a one-admin limit.
    auth.create_admin("second", "second-password").await.unwrap();
    assert!(auth.login("second", "second-password").await.is_ok());
}
