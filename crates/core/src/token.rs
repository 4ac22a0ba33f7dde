//! Compact signed tokens for sessions and share links.
//!
//! Wire form is `base64url(json(payload)) + "." + base64url(hmac)`, where the
//! HMAC-SHA256 is computed over the encoded payload with the process secret.
//! Payloads are signed, not encrypted: they only carry a type tag, an expiry
//! and (for share tokens) a keyed password digest.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::Mac;
use serde::{Deserialize, Serialize};

use crate::hashing::{derive_key, hmac_sha256};
use crate::types::{EpochMillis, Timestamp};

/// Lifetime of a session token issued by [`TokenCodec::issue_session_token`].
pub const SESSION_TOKEN_TTL_DAYS: i64 = 7;

/// Label used to derive the share-password digest key from the secret.
const SHARE_PASSWORD_LABEL: &str = "meterdeck/share-password/v1";

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TokenPayload {
    Session {
        exp: EpochMillis,
    },
    Share {
        exp: EpochMillis,
        #[serde(rename = "readOnly")]
        read_only: bool,
        #[serde(
            rename = "passwordDigest",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        password_digest: Option<String>,
    },
}

impl TokenPayload {
    pub fn expires_at_millis(&self) -> EpochMillis {
        match self {
            TokenPayload::Session { exp } | TokenPayload::Share { exp, .. } => *exp,
        }
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        chrono::DateTime::from_timestamp_millis(self.expires_at_millis())
    }
}

/// Why a token failed verification.
///
/// Only used for logging; every variant fails closed the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

/// Issues and verifies signed tokens with a single process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    password_key: Vec<u8>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let secret = secret.as_bytes().to_vec();
        let password_key = derive_key(&secret, SHARE_PASSWORD_LABEL);
        Self {
            secret,
            password_key,
        }
    }

    /// Issue a full-access session token valid for seven days.
    pub fn issue_session_token(&self) -> String {
        self.issue_session_token_with_ttl(chrono::Duration::days(SESSION_TOKEN_TTL_DAYS))
    }

    pub fn issue_session_token_with_ttl(&self, ttl: chrono::Duration) -> String {
        let exp = (Utc::now() + ttl).timestamp_millis();
        self.sign(&TokenPayload::Session { exp })
    }

    /// Issue a read-only share token valid for `expires_in_hours`.
    ///
    /// When `password` is given, only its keyed digest travels in the token.
    pub fn issue_share_token(&self, expires_in_hours: i64, password: Option<&str>) -> String {
        self.issue_share_token_with_ttl(chrono::Duration::hours(expires_in_hours), password)
    }

    pub fn issue_share_token_with_ttl(
        &self,
        ttl: chrono::Duration,
        password: Option<&str>,
    ) -> String {
        self.issue_share_token_until(Utc::now() + ttl, password)
    }

    /// Issue a read-only share token expiring at an absolute instant.
    pub fn issue_share_token_until(&self, expires_at: Timestamp, password: Option<&str>) -> String {
        self.sign(&TokenPayload::Share {
            exp: expires_at.timestamp_millis(),
            read_only: true,
            password_digest: password.map(|p| self.password_digest(p)),
        })
    }

    /// Verify a token against the current wall clock.
    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature, structure and expiry relative to `now`.
    pub fn verify_at(&self, token: &str, now: Timestamp) -> Result<TokenPayload, TokenError> {
        let (encoded, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        if encoded.is_empty() || signature.is_empty() {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = hmac_sha256(&self.secret);
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| TokenError::Malformed)?;
        let payload: TokenPayload =
            serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;

        if now.timestamp_millis() >= payload.expires_at_millis() {
            return Err(TokenError::Expired);
        }
        Ok(payload)
    }

    /// Keyed digest of a share password, base64url encoded.
    pub fn password_digest(&self, password: &str) -> String {
        let mut mac = hmac_sha256(&self.password_key);
        mac.update(password.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Check `candidate` against a digest produced by [`Self::password_digest`].
    pub fn verify_share_password(&self, candidate: &str, digest: &str) -> bool {
        let Ok(expected) = URL_SAFE_NO_PAD.decode(digest) else {
            return false;
        };
        let mut mac = hmac_sha256(&self.password_key);
        mac.update(candidate.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn sign(&self, payload: &TokenPayload) -> String {
        // Serializing a plain enum of integers and strings cannot fail.
        let json = serde_json::to_vec(payload).unwrap_or_default();
        let encoded = URL_SAFE_NO_PAD.encode(json);

        let mut mac = hmac_sha256(&self.secret);
        mac.update(encoded.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{encoded}.{signature}")
    }
}
