//! Double-submit CSRF protection.
//!
//! A token is `nonce.issued_at_ms.signature`. Mutating requests must echo the
//! same token in the [`CSRF_COOKIE`] cookie and the [`CSRF_HEADER`] header,
//! and the token must carry a valid signature no older than [`CSRF_MAX_AGE_HOURS`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::Mac;
use rand::Rng;

use crate::hashing::{constant_time_eq, derive_key, hmac_sha256};
use crate::request::RequestContext;
use crate::types::Timestamp;

pub const CSRF_COOKIE: &str = "meterdeck_csrf";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_MAX_AGE_HOURS: i64 = 24;

/// Tolerated clock skew for tokens that claim to be from the future.
const FUTURE_SKEW_SECS: i64 = 60;

const NONCE_BYTES: usize = 32;
const CSRF_KEY_LABEL: &str = "meterdeck/csrf/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CsrfError {
    #[error("CSRF token missing from cookie or header")]
    Missing,
    #[error("CSRF cookie and header do not match")]
    Mismatch,
    #[error("CSRF token is malformed or its signature is invalid")]
    InvalidSignature,
    #[error("CSRF token has expired")]
    Expired,
}

#[derive(Clone)]
pub struct CsrfGuard {
    key: Vec<u8>,
    max_age: chrono::Duration,
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl CsrfGuard {
    pub fn new(secret: &str) -> Self {
        Self {
            key: derive_key(secret.as_bytes(), CSRF_KEY_LABEL),
            max_age: chrono::Duration::hours(CSRF_MAX_AGE_HOURS),
        }
    }

    pub fn issue(&self) -> String {
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&self, now: Timestamp) -> String {
        let mut nonce = [0u8; NONCE_BYTES];
        rand::rng().fill(&mut nonce);
        let message = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(nonce),
            now.timestamp_millis()
        );
        let signature = self.signature(&message);
        format!("{message}.{signature}")
    }

    pub fn validate(&self, req: &impl RequestContext) -> Result<(), CsrfError> {
        self.validate_at(req, Utc::now())
    }

    /// Safe methods pass unconditionally; everything else needs a matching,
    /// signed and fresh cookie/header pair.
    pub fn validate_at(&self, req: &impl RequestContext, now: Timestamp) -> Result<(), CsrfError> {
        if req.is_safe_method() {
            return Ok(());
        }

        let cookie = req.cookie(CSRF_COOKIE).filter(|v| !v.is_empty());
        let header = req.header(CSRF_HEADER).filter(|v| !v.is_empty());
        let (Some(cookie), Some(header)) = (cookie, header) else {
            return Err(CsrfError::Missing);
        };

        if !constant_time_eq(cookie.as_bytes(), header.as_bytes()) {
            return Err(CsrfError::Mismatch);
        }

        self.verify_token_at(header, now)
    }

    /// Check a token's own signature and age, independent of any request.
    pub fn verify_token_at(&self, token: &str, now: Timestamp) -> Result<(), CsrfError> {
        let (message, signature) = token
            .rsplit_once('.')
            .ok_or(CsrfError::InvalidSignature)?;
        let (_nonce, issued_at) = message
            .split_once('.')
            .ok_or(CsrfError::InvalidSignature)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CsrfError::InvalidSignature)?;
        let mut mac = hmac_sha256(&self.key);
        mac.update(message.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| CsrfError::InvalidSignature)?;

        let issued_at: i64 = issued_at
            .parse()
            .map_err(|_| CsrfError::InvalidSignature)?;
        let age_ms = now.timestamp_millis() - issued_at;
        if age_ms > self.max_age.num_milliseconds() || age_ms < -FUTURE_SKEW_SECS * 1000 {
            return Err(CsrfError::Expired);
        }
        Ok(())
    }

    fn signature(&self, message: &str) -> String {
        let mut mac = hmac_sha256(&self.key);
        mac.update(message.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::StaticRequest;

    fn guard() -> CsrfGuard {
        CsrfGuard::new("test-secret-that-is-long-enough-for-hmac")
    }

    fn post_with(cookie: &str, header: &str) -> StaticRequest {
        StaticRequest::new("POST")
            .with_cookie(CSRF_COOKIE, cookie)
            .with_header(CSRF_HEADER, header)
    }

    #[test]
    fn matching_fresh_token_passes() {
        let guard = guard();
        let token = guard.issue();
        assert_eq!(guard.validate(&post_with(&token, &token)), Ok(()));
    }

    #[test]
    fn get_requests_bypass_regardless_of_token_state() {
        let guard = guard();
        assert_eq!(guard.validate(&StaticRequest::new("GET")), Ok(()));

        let stale = guard.issue_at(Utc::now() - chrono::Duration::days(30));
        let req = StaticRequest::new("GET")
            .with_cookie(CSRF_COOKIE, &stale)
            .with_header(CSRF_HEADER, "garbage");
        assert_eq!(guard.validate(&req), Ok(()));
    }

    #[test]
    fn missing_header_or_cookie_is_rejected() {
        let guard = guard();
        let token = guard.issue();

        let only_cookie = StaticRequest::new("POST").with_cookie(CSRF_COOKIE, &token);
        assert_eq!(guard.validate(&only_cookie), Err(CsrfError::Missing));

        let only_header = StaticRequest::new("POST").with_header(CSRF_HEADER, &token);
        assert_eq!(guard.validate(&only_header), Err(CsrfError::Missing));
    }

    #[test]
    fn mismatched_pair_is_rejected() {
        let guard = guard();
        let a = guard.issue();
        let b = guard.issue();
        assert_eq!(guard.validate(&post_with(&a, &b)), Err(CsrfError::Mismatch));
    }

    #[test]
    fn matching_but_expired_token_is_rejected() {
        let guard = guard();
        let old = guard.issue_at(Utc::now() - chrono::Duration::hours(CSRF_MAX_AGE_HOURS + 1));
        assert_eq!(guard.validate(&post_with(&old, &old)), Err(CsrfError::Expired));
    }

    #[test]
    fn matching_but_forged_token_is_rejected() {
        let forged = format!("nonce.{}.c2lnbmF0dXJl", Utc::now().timestamp_millis());
        assert_eq!(
            guard().validate(&post_with(&forged, &forged)),
            Err(CsrfError::InvalidSignature)
        );
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let foreign = CsrfGuard::new("another-secret").issue();
        assert_eq!(
            guard().validate(&post_with(&foreign, &foreign)),
            Err(CsrfError::InvalidSignature)
        );
    }

    #[test]
    fn tokens_are_unique() {
        let guard = guard();
        assert_ne!(guard.issue(), guard.issue());
    }
}
