//! Per-client rate limiting as a typed extractor.
//!
//! The scope type picks the key prefix and policy, so a handler declares its
//! limit in its signature:
//!
//! ```ignore
//! async fn login(_: RateLimit<LoginScope>, ...) -> AppResult<...> { ... }
//! ```

use std::marker::PhantomData;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use meterdeck_core::rate_limit::{RateLimitDecision, RateLimitPolicy};

use super::client_ip::ClientIp;
use crate::error::AppError;
use crate::state::AppState;

pub trait RateLimitScope: Send + Sync + 'static {
    /// Key prefix, e.g. `login` in `login:203.0.113.9`.
    const PREFIX: &'static str;
    const POLICY: RateLimitPolicy;
}

pub struct LoginScope;

impl RateLimitScope for LoginScope {
    const PREFIX: &'static str = "login";
    const POLICY: RateLimitPolicy = RateLimitPolicy::LOGIN;
}

pub struct ShareScope;

impl RateLimitScope for ShareScope {
    const PREFIX: &'static str = "share";
    const POLICY: RateLimitPolicy = RateLimitPolicy::SHARE_CREATE;
}

pub struct ApiScope;

impl RateLimitScope for ApiScope {
    const PREFIX: &'static str = "api";
    const POLICY: RateLimitPolicy = RateLimitPolicy::API;
}

/// Passed the limiter for scope `S`. Rejects with 429 otherwise.
pub struct RateLimit<S: RateLimitScope> {
    pub decision: RateLimitDecision,
    scope: PhantomData<S>,
}

impl<S: RateLimitScope> FromRequestParts<AppState> for RateLimit<S> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ClientIp(ip) = ClientIp::from_parts(parts, state.config.trust_proxy_headers);
        let key = format!("{}:{ip}", S::PREFIX);
        let decision = state.rate_limiter.check(&key, S::POLICY);

        if !decision.allowed {
            tracing::warn!(
                event = "rate_limited",
                key = %key,
                retry_after_ms = decision.retry_after_ms,
                "Request rate limited"
            );
            return Err(AppError::RateLimited(decision));
        }

        Ok(RateLimit {
            decision,
            scope: PhantomData,
        })
    }
}
