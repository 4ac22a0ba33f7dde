//! Handler for the dashboard payload.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::auth::authority::{AuthDecision, DenyReason};
use crate::error::{AppError, AppResult};
use crate::middleware::rate_limit::{ApiScope, RateLimit};
use crate::middleware::request::HttpRequestContext;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    /// `full` for sessions, `read_only` for share links.
    pub access: &'static str,
    pub data: Value,
}

/// GET /api/v1/usage
pub async fn get_usage(
    State(state): State<AppState>,
    _limit: RateLimit<ApiScope>,
    ctx: HttpRequestContext,
) -> AppResult<Json<UsageResponse>> {
    let decision = state.authority.authorize(&ctx).await?;

    match &decision {
        AuthDecision::Session(_) | AuthDecision::Share(_) => {}
        AuthDecision::SharePasswordPending => {
            return Err(AppError::Denied(DenyReason::SharePasswordRequired));
        }
        AuthDecision::Denied(reason) => return Err(AppError::Denied(*reason)),
    }

    let data = state
        .usage
        .dashboard()
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to load usage data: {e}")))?;

    Ok(Json(UsageResponse {
        access: decision.access_level(),
        data,
    }))
}
