//! Handlers for the CSRF, login, logout and session endpoints.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use meterdeck_core::request::RequestContext;
use meterdeck_db::models::user::UserResponse;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authority::{AuthDecision, AuthorityError};
use crate::auth::backend::{ClientMeta, LoginCredentials};
use crate::auth::cookies::{clear_session_cookie, csrf_cookie, session_cookie, SESSION_COOKIE};
use crate::error::{AppError, AppResult};
use crate::middleware::client_ip::ClientIp;
use crate::middleware::csrf::CsrfProtected;
use crate::middleware::json::AppJson;
use crate::middleware::rate_limit::{ApiScope, LoginScope, RateLimit};
use crate::middleware::request::HttpRequestContext;
use crate::response::OkResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub token: String,
}

/// Request body for `POST /login`. `email` is only read in accounts mode.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 256))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

/// Body of `GET /session`.
#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub mode: &'static str,
    pub access: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/csrf
///
/// Issue a fresh CSRF token, set it as a cookie and echo it for the header.
pub async fn csrf_token(
    State(state): State<AppState>,
    _limit: RateLimit<ApiScope>,
) -> AppResult<impl IntoResponse> {
    let token = state.authority.csrf()?.issue();
    let cookie = csrf_cookie(&token, state.config.auth.cookie_secure);

    Ok(([(header::SET_COOKIE, cookie)], Json(CsrfTokenResponse { token })))
}

/// POST /api/v1/login
pub async fn login(
    State(state): State<AppState>,
    _limit: RateLimit<LoginScope>,
    _csrf: CsrfProtected,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    AppJson(input): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let backend = state.authority.backend()?;
    let credentials = LoginCredentials {
        email: input.email,
        password: input.password,
    };
    let meta = ClientMeta {
        ip_address: Some(ip.clone()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let outcome = match backend.login(&credentials, &meta).await {
        Ok(outcome) => outcome,
        Err(AuthorityError::InvalidCredentials) => {
            tracing::warn!(
                event = "login_failed",
                ip = %ip,
                mode = %state.authority.mode(),
                "Login failed"
            );
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        ip = %ip,
        user_id = outcome.user.as_ref().map(|u| u.id),
        "Login succeeded"
    );

    let cookie = session_cookie(
        &outcome.session_token,
        state.config.auth.session_ttl(),
        state.config.auth.cookie_secure,
    );
    let body = LoginResponse {
        ok: true,
        user: outcome.user.as_ref().map(UserResponse::from),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// POST /api/v1/logout
///
/// Always succeeds. Server-side session removal is best-effort.
pub async fn logout(State(state): State<AppState>, ctx: HttpRequestContext) -> impl IntoResponse {
    if let Some(token) = ctx.cookie(SESSION_COOKIE).filter(|t| !t.is_empty()) {
        match state.authority.backend() {
            Ok(backend) => {
                if let Err(e) = backend.logout(token).await {
                    tracing::warn!(error = %e, "Failed to end session on logout");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Logout without a configured backend"),
        }
    }

    let cookie = clear_session_cookie(state.config.auth.cookie_secure);
    ([(header::SET_COOKIE, cookie)], Json(OkResponse::ok()))
}

/// GET /api/v1/session
///
/// Report how the current request would be authorized.
pub async fn session(
    State(state): State<AppState>,
    ctx: HttpRequestContext,
) -> AppResult<Json<SessionStatus>> {
    let decision = state.authority.authorize(&ctx).await?;

    let user = match &decision {
        AuthDecision::Session(identity) => identity.user().map(UserResponse::from),
        _ => None,
    };

    Ok(Json(SessionStatus {
        authenticated: matches!(decision, AuthDecision::Session(_) | AuthDecision::Share(_)),
        mode: state.authority.mode().as_str(),
        access: decision.access_level(),
        user,
        reason: decision.deny_reason().map(|r| r.as_code()),
    }))
}
