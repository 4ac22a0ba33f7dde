//! Repository and store tests against a real PostgreSQL database.
//!
//! These need `DATABASE_URL`; run with `cargo test -p meterdeck-db -- --ignored`.

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use meterdeck_core::roles::Role;
use meterdeck_db::models::session::CreateSession;
use meterdeck_db::models::share_link::CreateShareLink;
use meterdeck_db::models::user::{CreateUser, UpdateUser};
use meterdeck_db::repositories::{SessionRepo, ShareLinkRepo, UserRepo};
use meterdeck_db::{CredentialStore, PgCredentialStore, StoreError};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_user(email: &str, role: Role) -> CreateUser {
    CreateUser {
        email: email.to_string(),
        password_hash: Some("$argon2id$v=19$placeholder".to_string()),
        name: "Test".to_string(),
        role,
    }
}

fn new_session(user_id: i64, hash: &str, ttl: Duration) -> CreateSession {
    CreateSession {
        user_id,
        token_hash: hash.to_string(),
        expires_at: Utc::now() + ttl,
        user_agent: Some("test-agent".to_string()),
        ip_address: Some("127.0.0.1".to_string()),
    }
}

fn new_share(token: &str, ttl: Duration) -> CreateShareLink {
    CreateShareLink {
        token: token.to_string(),
        expires_at: Utc::now() + ttl,
        password_protected: false,
        created_by: "legacy".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_duplicate_email_maps_to_conflict(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    store
        .create_user(&new_user("dup@example.com", Role::Viewer))
        .await
        .unwrap();

    let err = store
        .create_user(&new_user("dup@example.com", Role::Admin))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Conflict(msg) if msg.contains("already exists"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_find_by_email_is_case_insensitive(pool: PgPool) {
    let user = UserRepo::create(&pool, &new_user("case@example.com", Role::Developer))
        .await
        .unwrap();

    let found = UserRepo::find_by_email(&pool, "CASE@Example.com")
        .await
        .unwrap()
        .expect("user should be found");
    assert_eq!(found.id, user.id);
    assert_eq!(found.role, "developer");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_update_user_partial_fields(pool: PgPool) {
    let user = UserRepo::create(&pool, &new_user("upd@example.com", Role::Viewer))
        .await
        .unwrap();

    let update = UpdateUser {
        role: Some(Role::Billing),
        is_active: Some(false),
        ..Default::default()
    };
    let updated = UserRepo::update(&pool, user.id, &update)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.role, "billing");
    assert!(!updated.is_active);
    assert_eq!(updated.email, "upd@example.com");

    assert!(UserRepo::update(&pool, 999_999, &update)
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_record_login_and_password_update(pool: PgPool) {
    let user = UserRepo::create(&pool, &new_user("login@example.com", Role::Viewer))
        .await
        .unwrap();
    assert!(user.last_login_at.is_none());

    UserRepo::record_login(&pool, user.id).await.unwrap();
    assert!(UserRepo::update_password(&pool, user.id, "$argon2id$new")
        .await
        .unwrap());

    let reloaded = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert!(reloaded.last_login_at.is_some());
    assert_eq!(reloaded.password_hash.as_deref(), Some("$argon2id$new"));
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_deleting_user_cascades_sessions(pool: PgPool) {
    let user = UserRepo::create(&pool, &new_user("cascade@example.com", Role::Viewer))
        .await
        .unwrap();
    SessionRepo::create(&pool, &new_session(user.id, "hash-a", Duration::days(7)))
        .await
        .unwrap();

    assert!(UserRepo::delete(&pool, user.id).await.unwrap());
    assert!(SessionRepo::find_by_token_hash(&pool, "hash-a")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_cleanup_expired_sessions(pool: PgPool) {
    let user = UserRepo::create(&pool, &new_user("sweep@example.com", Role::Viewer))
        .await
        .unwrap();
    SessionRepo::create(&pool, &new_session(user.id, "old", Duration::seconds(-1)))
        .await
        .unwrap();
    SessionRepo::create(&pool, &new_session(user.id, "live", Duration::days(1)))
        .await
        .unwrap();

    assert_eq!(SessionRepo::cleanup_expired(&pool).await.unwrap(), 1);
    assert_eq!(SessionRepo::delete_all_for_user(&pool, user.id).await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Share links
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_share_link_access_and_revoke_once(pool: PgPool) {
    let link = ShareLinkRepo::create(&pool, &new_share("tok-1", Duration::hours(24)))
        .await
        .unwrap();

    ShareLinkRepo::record_access(&pool, "tok-1").await.unwrap();
    let found = ShareLinkRepo::find_by_token(&pool, "tok-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.access_count, 1);

    let revoked = ShareLinkRepo::revoke(&pool, link.id).await.unwrap().unwrap();
    let again = ShareLinkRepo::revoke(&pool, link.id).await.unwrap().unwrap();
    assert_eq!(revoked.revoked_at, again.revoked_at);
    assert!(ShareLinkRepo::revoke(&pool, 999_999).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_duplicate_share_token_is_conflict(pool: PgPool) {
    let store = PgCredentialStore::new(pool);
    store
        .create_share_link(&new_share("same", Duration::hours(1)))
        .await
        .unwrap();
    assert_matches!(
        store.create_share_link(&new_share("same", Duration::hours(1))).await,
        Err(StoreError::Conflict(_))
    );
}
