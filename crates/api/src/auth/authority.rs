//! The central access decision for every protected request.
//!
//! Order matters: configuration, then session cookie, then share token, then
//! the share password. A valid session always wins over a share token on the
//! same request, and the distinct share denial reasons let the client decide
//! between a password prompt and an error page.

use std::sync::Arc;

use meterdeck_core::csrf::CsrfGuard;
use meterdeck_core::request::RequestContext;
use meterdeck_core::token::{TokenCodec, TokenPayload};
use meterdeck_core::types::Timestamp;
use meterdeck_db::{CredentialStore, StoreError};

use super::backend::{AccountsBackend, AuthBackend, Identity, LegacyPasswordBackend};
use super::cookies::SESSION_COOKIE;
use crate::config::{AuthConfig, AuthMode};

/// Query parameter carrying a share token.
pub const SHARE_QUERY_PARAM: &str = "share";

/// Header carrying the share password.
pub const SHARE_PASSWORD_HEADER: &str = "x-share-password";

#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    /// No signing secret, or the active backend lacks its credential.
    #[error("authentication is not configured")]
    NotConfigured,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

/// Why a request was turned away. Each maps to a distinct client-facing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Neither a session nor a share token was presented.
    Unauthorized,
    /// Share token forged, expired, revoked or otherwise unusable.
    ShareInvalid,
    /// Share token is valid but password protected and no password was sent.
    SharePasswordRequired,
    SharePasswordInvalid,
}

impl DenyReason {
    pub fn as_code(self) -> &'static str {
        match self {
            DenyReason::Unauthorized => "unauthorized",
            DenyReason::ShareInvalid => "share_invalid",
            DenyReason::SharePasswordRequired => "share_password_required",
            DenyReason::SharePasswordInvalid => "share_password_invalid",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            DenyReason::Unauthorized => "Authentication required",
            DenyReason::ShareInvalid => "This share link is invalid or has expired",
            DenyReason::SharePasswordRequired => "This share link requires a password",
            DenyReason::SharePasswordInvalid => "Incorrect share link password",
        }
    }
}

/// Read-only access granted by a share token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareGrant {
    pub expires_at: Option<Timestamp>,
    pub password_protected: bool,
}

#[derive(Debug, Clone)]
pub enum AuthDecision {
    /// Full access through a session cookie.
    Session(Identity),
    /// Read-only access through a share token.
    Share(ShareGrant),
    /// The share token checks out but its password has not been supplied.
    SharePasswordPending,
    Denied(DenyReason),
}

impl AuthDecision {
    pub fn access_level(&self) -> &'static str {
        match self {
            AuthDecision::Session(_) => "full",
            AuthDecision::Share(_) => "read_only",
            AuthDecision::SharePasswordPending | AuthDecision::Denied(_) => "none",
        }
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            AuthDecision::Session(_) | AuthDecision::Share(_) => None,
            AuthDecision::SharePasswordPending => Some(DenyReason::SharePasswordRequired),
            AuthDecision::Denied(reason) => Some(*reason),
        }
    }
}

/// Owns the signing material and the active login backend.
pub struct SessionAuthority {
    codec: Option<TokenCodec>,
    csrf: Option<CsrfGuard>,
    backend: Option<Arc<dyn AuthBackend>>,
    store: Arc<dyn CredentialStore>,
    mode: AuthMode,
}

impl std::fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("mode", &self.mode)
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

impl SessionAuthority {
    /// Build the authority and the backend selected by `config.mode`.
    ///
    /// Without a secret no backend is built and every check reports
    /// [`AuthorityError::NotConfigured`].
    pub fn from_config(config: &AuthConfig, store: Arc<dyn CredentialStore>) -> Self {
        let codec = config.secret.as_deref().map(TokenCodec::new);
        let csrf = config.secret.as_deref().map(CsrfGuard::new);

        let backend: Option<Arc<dyn AuthBackend>> = codec.as_ref().map(|codec| match config.mode {
            AuthMode::Legacy => Arc::new(LegacyPasswordBackend::new(
                config.dashboard_password.clone(),
                codec.clone(),
                config.session_ttl(),
            )) as Arc<dyn AuthBackend>,
            AuthMode::Accounts => Arc::new(AccountsBackend::new(
                Arc::clone(&store),
                config.session_ttl(),
            )),
        });

        Self {
            codec,
            csrf,
            backend,
            store,
            mode: config.mode,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn is_configured(&self) -> bool {
        self.codec.is_some() && self.backend.as_ref().is_some_and(|b| b.is_configured())
    }

    pub fn codec(&self) -> Result<&TokenCodec, AuthorityError> {
        match &self.codec {
            Some(codec) if self.is_configured() => Ok(codec),
            _ => Err(AuthorityError::NotConfigured),
        }
    }

    pub fn csrf(&self) -> Result<&CsrfGuard, AuthorityError> {
        self.csrf.as_ref().ok_or(AuthorityError::NotConfigured)
    }

    pub fn backend(&self) -> Result<&dyn AuthBackend, AuthorityError> {
        match &self.backend {
            Some(backend) if backend.is_configured() => Ok(backend.as_ref()),
            _ => Err(AuthorityError::NotConfigured),
        }
    }

    /// Resolve the session cookie only. Used where read-only access is not enough.
    pub async fn resolve_session<R>(&self, req: &R) -> Result<Option<Identity>, AuthorityError>
    where
        R: RequestContext + Sync,
    {
        self.codec()?;
        let backend = self.backend()?;

        let Some(token) = req.cookie(SESSION_COOKIE).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        backend.resolve_session(token).await
    }

    /// Decide whether the request may read the dashboard, and how.
    pub async fn authorize<R>(&self, req: &R) -> Result<AuthDecision, AuthorityError>
    where
        R: RequestContext + Sync,
    {
        if let Some(identity) = self.resolve_session(req).await? {
            return Ok(AuthDecision::Session(identity));
        }

        let Some(token) = req
            .query_param(SHARE_QUERY_PARAM)
            .filter(|t| !t.is_empty())
        else {
            return Ok(AuthDecision::Denied(DenyReason::Unauthorized));
        };

        self.authorize_share(req, &token).await
    }

    async fn authorize_share<R>(&self, req: &R, token: &str) -> Result<AuthDecision, AuthorityError>
    where
        R: RequestContext + Sync,
    {
        let codec = self.codec()?;

        let payload = match codec.verify(token) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(event = "share_token_rejected", reason = %e, "Share token rejected");
                return Ok(AuthDecision::Denied(DenyReason::ShareInvalid));
            }
        };
        let TokenPayload::Share {
            password_digest, ..
        } = &payload
        else {
            tracing::warn!(
                event = "share_token_rejected",
                reason = "wrong_type",
                "Session token presented as share token"
            );
            return Ok(AuthDecision::Denied(DenyReason::ShareInvalid));
        };

        // Revocation is checked on top of cryptographic validity. A store
        // failure here must not fall open.
        let record = self.store.find_share_link_by_token(token).await?;
        if let Some(link) = &record {
            if link.is_revoked() {
                tracing::warn!(
                    event = "share_token_revoked",
                    share_link_id = link.id,
                    "Revoked share link used"
                );
                return Ok(AuthDecision::Denied(DenyReason::ShareInvalid));
            }
        }

        if let Some(digest) = password_digest {
            let supplied = req
                .header(SHARE_PASSWORD_HEADER)
                .filter(|p| !p.is_empty());
            let Some(supplied) = supplied else {
                return Ok(AuthDecision::SharePasswordPending);
            };
            if !codec.verify_share_password(supplied, digest) {
                tracing::warn!(event = "share_password_invalid", "Wrong share link password");
                return Ok(AuthDecision::Denied(DenyReason::SharePasswordInvalid));
            }
        }

        if let Some(link) = &record {
            if let Err(e) = self.store.record_share_access(token).await {
                tracing::warn!(share_link_id = link.id, error = %e, "Failed to record share access");
            }
        }

        Ok(AuthDecision::Share(ShareGrant {
            expires_at: payload.expires_at(),
            password_protected: password_digest.is_some(),
        }))
    }
}
