//! Login backends. Exactly one is active, chosen from `AUTH_MODE` at startup.
//!
//! Both backends hand the client an opaque value for the session cookie and
//! resolve that value back to an [`Identity`]; everything downstream of
//! session resolution is backend-agnostic.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use meterdeck_core::hashing::{constant_time_eq, sha256_hex};
use meterdeck_core::roles::{has_permission, Permission};
use meterdeck_core::token::{TokenCodec, TokenPayload};
use meterdeck_core::validation::normalize_email;
use meterdeck_db::models::session::CreateSession;
use meterdeck_db::models::user::User;
use meterdeck_db::CredentialStore;
use rand::Rng;

use super::authority::AuthorityError;
use super::password::{verify_dummy, verify_password};
use crate::config::AuthMode;

const SESSION_TOKEN_BYTES: usize = 32;

/// Who a resolved session belongs to.
#[derive(Debug, Clone)]
pub enum Identity {
    /// Holder of the shared dashboard password. Owns the whole dashboard.
    Legacy,
    /// A persisted user account.
    Account(User),
}

impl Identity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Legacy => None,
            Identity::Account(user) => Some(user),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        match self {
            Identity::Legacy => true,
            Identity::Account(user) => has_permission(user, permission),
        }
    }

    /// Short label for audit columns such as `share_links.created_by`.
    pub fn label(&self) -> String {
        match self {
            Identity::Legacy => "legacy".to_string(),
            Identity::Account(user) => user.email.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: Option<String>,
    pub password: String,
}

/// Request metadata recorded alongside persisted sessions.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Value for the session cookie.
    pub session_token: String,
    /// The logged-in account, absent in legacy mode.
    pub user: Option<User>,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    fn mode(&self) -> AuthMode;

    /// Whether the backend has the credential material it needs to log anyone in.
    fn is_configured(&self) -> bool;

    async fn login(
        &self,
        credentials: &LoginCredentials,
        meta: &ClientMeta,
    ) -> Result<LoginOutcome, AuthorityError>;

    /// Resolve a session cookie value. `Ok(None)` means "not a live session".
    async fn resolve_session(&self, token: &str) -> Result<Option<Identity>, AuthorityError>;

    async fn logout(&self, token: &str) -> Result<(), AuthorityError>;
}

// ---------------------------------------------------------------------------
// Legacy: one shared password
// ---------------------------------------------------------------------------

/// Single shared password; the session cookie is a signed session token.
pub struct LegacyPasswordBackend {
    password: Option<String>,
    codec: TokenCodec,
    session_ttl: chrono::Duration,
}

impl LegacyPasswordBackend {
    pub fn new(password: Option<String>, codec: TokenCodec, session_ttl: chrono::Duration) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()),
            codec,
            session_ttl,
        }
    }
}

#[async_trait]
impl AuthBackend for LegacyPasswordBackend {
    fn mode(&self) -> AuthMode {
        AuthMode::Legacy
    }

    fn is_configured(&self) -> bool {
        self.password.is_some()
    }

    async fn login(
        &self,
        credentials: &LoginCredentials,
        _meta: &ClientMeta,
    ) -> Result<LoginOutcome, AuthorityError> {
        let expected = self.password.as_deref().ok_or(AuthorityError::NotConfigured)?;

        // Fixed-length digests so the comparison cost is independent of input length.
        let candidate = sha256_hex(credentials.password.as_bytes());
        let expected = sha256_hex(expected.as_bytes());
        if !constant_time_eq(candidate.as_bytes(), expected.as_bytes()) {
            return Err(AuthorityError::InvalidCredentials);
        }

        Ok(LoginOutcome {
            session_token: self.codec.issue_session_token_with_ttl(self.session_ttl),
            user: None,
        })
    }

    async fn resolve_session(&self, token: &str) -> Result<Option<Identity>, AuthorityError> {
        match self.codec.verify(token) {
            Ok(TokenPayload::Session { .. }) => Ok(Some(Identity::Legacy)),
            Ok(TokenPayload::Share { .. }) => Ok(None),
            Err(e) => {
                tracing::debug!(reason = %e, "Session token rejected");
                Ok(None)
            }
        }
    }

    async fn logout(&self, _token: &str) -> Result<(), AuthorityError> {
        // Stateless: clearing the cookie is all there is.
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Accounts: per-user credentials, persisted sessions
// ---------------------------------------------------------------------------

/// Email/password accounts. Sessions are random tokens stored by digest.
pub struct AccountsBackend {
    store: Arc<dyn CredentialStore>,
    session_ttl: chrono::Duration,
}

impl AccountsBackend {
    pub fn new(store: Arc<dyn CredentialStore>, session_ttl: chrono::Duration) -> Self {
        Self { store, session_ttl }
    }

    fn generate_session_token() -> String {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        rand::rng().fill(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

#[async_trait]
impl AuthBackend for AccountsBackend {
    fn mode(&self) -> AuthMode {
        AuthMode::Accounts
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn login(
        &self,
        credentials: &LoginCredentials,
        meta: &ClientMeta,
    ) -> Result<LoginOutcome, AuthorityError> {
        let Some(email) = credentials.email.as_deref().map(normalize_email) else {
            verify_dummy(&credentials.password);
            return Err(AuthorityError::InvalidCredentials);
        };

        let user = self.store.find_user_by_email(&email).await?;
        let Some((user, hash)) = user.and_then(|u| {
            let hash = u.password_hash.clone()?;
            Some((u, hash))
        }) else {
            verify_dummy(&credentials.password);
            return Err(AuthorityError::InvalidCredentials);
        };

        let valid = verify_password(&credentials.password, &hash)
            .map_err(|e| AuthorityError::Internal(format!("Password verification error: {e}")))?;
        if !valid || !user.is_active {
            return Err(AuthorityError::InvalidCredentials);
        }

        let session_token = Self::generate_session_token();
        self.store
            .create_session(&CreateSession {
                user_id: user.id,
                token_hash: sha256_hex(session_token.as_bytes()),
                expires_at: Utc::now() + self.session_ttl,
                user_agent: meta.user_agent.clone(),
                ip_address: meta.ip_address.clone(),
            })
            .await?;

        if let Err(e) = self.store.record_login(user.id).await {
            tracing::warn!(user_id = user.id, error = %e, "Failed to record last login");
        }

        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome {
            session_token,
            user: Some(user),
        })
    }

    async fn resolve_session(&self, token: &str) -> Result<Option<Identity>, AuthorityError> {
        let token_hash = sha256_hex(token.as_bytes());
        let Some(session) = self.store.find_session_by_token_hash(&token_hash).await? else {
            return Ok(None);
        };

        if session.is_expired_at(Utc::now()) {
            if let Err(e) = self.store.delete_session_by_token_hash(&token_hash).await {
                tracing::warn!(session_id = session.id, error = %e, "Failed to delete expired session");
            }
            return Ok(None);
        }

        match self.store.find_user_by_id(session.user_id).await? {
            Some(user) if user.is_active => Ok(Some(Identity::Account(user))),
            _ => Ok(None),
        }
    }

    async fn logout(&self, token: &str) -> Result<(), AuthorityError> {
        self.store
            .delete_session_by_token_hash(&sha256_hex(token.as_bytes()))
            .await?;
        Ok(())
    }
}
