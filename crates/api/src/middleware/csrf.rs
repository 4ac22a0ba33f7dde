//! Double-submit CSRF check as an extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::request::HttpRequestContext;
use crate::error::AppError;
use crate::state::AppState;

/// The request carried a matching, signed, fresh CSRF cookie/header pair
/// (or used a safe method). Rejects with 403 `csrf_invalid` otherwise.
pub struct CsrfProtected;

impl FromRequestParts<AppState> for CsrfProtected {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let guard = state.authority.csrf()?;
        let ctx = HttpRequestContext::from_parts(parts);

        guard.validate(&ctx).map_err(|e| {
            tracing::warn!(
                event = "csrf_rejected",
                method = %parts.method,
                path = %parts.uri.path(),
                reason = %e,
                "CSRF validation failed"
            );
            AppError::Csrf(e)
        })?;

        Ok(CsrfProtected)
    }
}
