//! Session-cookie authentication extractors for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::request::HttpRequestContext;
use crate::auth::authority::DenyReason;
use crate::auth::backend::Identity;
use crate::config::AuthMode;
use crate::error::AppError;
use crate::state::AppState;

/// Identity behind a live session cookie. Share tokens do not count.
///
/// ```ignore
/// async fn my_handler(SessionAuth(identity): SessionAuth) -> AppResult<Json<()>> {
///     tracing::info!(who = %identity.label(), "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionAuth(pub Identity);

impl FromRequestParts<AppState> for SessionAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = HttpRequestContext::from_parts(parts);
        state
            .authority
            .resolve_session(&ctx)
            .await?
            .map(SessionAuth)
            .ok_or(AppError::Denied(DenyReason::Unauthorized))
    }
}

/// Only passes in accounts mode; the user routes do not exist otherwise.
pub struct AccountsOnly;

impl FromRequestParts<AppState> for AccountsOnly {
    type Rejection = AppError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.authority.mode() != AuthMode::Accounts {
            return Err(AppError::NotFound(
                "User accounts are not enabled".to_string(),
            ));
        }
        Ok(AccountsOnly)
    }
}
