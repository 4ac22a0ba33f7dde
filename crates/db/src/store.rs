//! The persistence contract the auth layer depends on.

use async_trait::async_trait;
use meterdeck_core::types::DbId;

use crate::models::session::{CreateSession, Session};
use crate::models::share_link::{CreateShareLink, ShareLink};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::repositories::{SessionRepo, ShareLinkRepo, UserRepo};
use crate::DbPool;

/// PostgreSQL SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    /// Unique violations on an `uq_` constraint become [`StoreError::Conflict`],
    /// classified by SQLSTATE and constraint name rather than message text.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.starts_with("uq_") {
                        return StoreError::Conflict(constraint_message(constraint));
                    }
                }
            }
        }
        StoreError::Database(err)
    }
}

fn constraint_message(constraint: &str) -> String {
    match constraint {
        "uq_users_email" => "A user with this email already exists".to_string(),
        other => format!("Duplicate value violates unique constraint: {other}"),
    }
}

/// Users, sessions and share-link bookkeeping.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // --- users ---
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError>;
    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn count_users(&self) -> Result<i64, StoreError>;
    async fn update_user(&self, id: DbId, input: &UpdateUser) -> Result<Option<User>, StoreError>;
    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, StoreError>;
    async fn record_login(&self, id: DbId) -> Result<(), StoreError>;
    async fn delete_user(&self, id: DbId) -> Result<bool, StoreError>;

    // --- sessions ---
    async fn create_session(&self, input: &CreateSession) -> Result<Session, StoreError>;
    async fn find_session_by_token_hash(&self, hash: &str) -> Result<Option<Session>, StoreError>;
    async fn delete_session_by_token_hash(&self, hash: &str) -> Result<bool, StoreError>;
    async fn delete_sessions_for_user(&self, user_id: DbId) -> Result<u64, StoreError>;
    async fn delete_expired_sessions(&self) -> Result<u64, StoreError>;

    // --- share links ---
    async fn create_share_link(&self, input: &CreateShareLink) -> Result<ShareLink, StoreError>;
    async fn find_share_link_by_token(&self, token: &str) -> Result<Option<ShareLink>, StoreError>;
    async fn list_share_links(&self) -> Result<Vec<ShareLink>, StoreError>;
    async fn record_share_access(&self, token: &str) -> Result<(), StoreError>;
    async fn revoke_share_link(&self, id: DbId) -> Result<Option<ShareLink>, StoreError>;
    async fn delete_expired_share_links(&self) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// [`CredentialStore`] backed by PostgreSQL through the repository structs.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: DbPool,
}

impl PgCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        Ok(UserRepo::create(&self.pool, input).await?)
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(UserRepo::list(&self.pool).await?)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(UserRepo::count(&self.pool).await?)
    }

    async fn update_user(&self, id: DbId, input: &UpdateUser) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::update(&self.pool, id, input).await?)
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, StoreError> {
        Ok(UserRepo::update_password(&self.pool, id, password_hash).await?)
    }

    async fn record_login(&self, id: DbId) -> Result<(), StoreError> {
        Ok(UserRepo::record_login(&self.pool, id).await?)
    }

    async fn delete_user(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(UserRepo::delete(&self.pool, id).await?)
    }

    async fn create_session(&self, input: &CreateSession) -> Result<Session, StoreError> {
        Ok(SessionRepo::create(&self.pool, input).await?)
    }

    async fn find_session_by_token_hash(&self, hash: &str) -> Result<Option<Session>, StoreError> {
        Ok(SessionRepo::find_by_token_hash(&self.pool, hash).await?)
    }

    async fn delete_session_by_token_hash(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(SessionRepo::delete_by_token_hash(&self.pool, hash).await?)
    }

    async fn delete_sessions_for_user(&self, user_id: DbId) -> Result<u64, StoreError> {
        Ok(SessionRepo::delete_all_for_user(&self.pool, user_id).await?)
    }

    async fn delete_expired_sessions(&self) -> Result<u64, StoreError> {
        Ok(SessionRepo::cleanup_expired(&self.pool).await?)
    }

    async fn create_share_link(&self, input: &CreateShareLink) -> Result<ShareLink, StoreError> {
        Ok(ShareLinkRepo::create(&self.pool, input).await?)
    }

    async fn find_share_link_by_token(&self, token: &str) -> Result<Option<ShareLink>, StoreError> {
        Ok(ShareLinkRepo::find_by_token(&self.pool, token).await?)
    }

    async fn list_share_links(&self) -> Result<Vec<ShareLink>, StoreError> {
        Ok(ShareLinkRepo::list(&self.pool).await?)
    }

    async fn record_share_access(&self, token: &str) -> Result<(), StoreError> {
        Ok(ShareLinkRepo::record_access(&self.pool, token).await?)
    }

    async fn revoke_share_link(&self, id: DbId) -> Result<Option<ShareLink>, StoreError> {
        Ok(ShareLinkRepo::revoke(&self.pool, id).await?)
    }

    async fn delete_expired_share_links(&self) -> Result<u64, StoreError> {
        Ok(ShareLinkRepo::cleanup_expired(&self.pool).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
