use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use meterdeck_core::csrf::CsrfError;
use meterdeck_core::error::CoreError;
use meterdeck_core::rate_limit::RateLimitDecision;
use meterdeck_db::StoreError;
use serde_json::json;

use crate::auth::authority::{AuthorityError, DenyReason};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds auth- and HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent
/// `{"error": <code>, "message": <text>}` bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `meterdeck_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A credential store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No signing secret or no credential for the selected auth backend.
    #[error("Authentication is not configured")]
    AuthNotConfigured,

    /// The authority refused the request.
    #[error("Access denied: {0:?}")]
    Denied(DenyReason),

    /// Login failed. Identical for unknown email and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("CSRF validation failed: {0}")]
    Csrf(#[from] CsrfError),

    #[error("Rate limit exceeded")]
    RateLimited(RateLimitDecision),

    /// A route that exists but is disabled in the current configuration.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<AuthorityError> for AppError {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::NotConfigured => AppError::AuthNotConfigured,
            AuthorityError::InvalidCredentials => AppError::InvalidCredentials,
            AuthorityError::Store(e) => AppError::Store(e),
            AuthorityError::Internal(msg) => AppError::InternalError(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::from(errors))
    }
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        INTERNAL_MESSAGE.to_string(),
                    )
                }
            },

            // --- Store errors ---
            AppError::Store(StoreError::Conflict(msg)) => {
                (StatusCode::CONFLICT, "conflict", msg.clone())
            }
            AppError::Store(err) => {
                tracing::error!(error = %err, "Credential store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    INTERNAL_MESSAGE.to_string(),
                )
            }

            // --- Auth errors ---
            AppError::AuthNotConfigured => {
                tracing::error!("Request rejected: authentication is not configured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "auth_not_configured",
                    "Authentication is not configured on this server".to_string(),
                )
            }
            AppError::Denied(reason) => (
                StatusCode::UNAUTHORIZED,
                reason.as_code(),
                reason.message().to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid credentials".to_string(),
            ),
            AppError::Csrf(_) => (
                StatusCode::FORBIDDEN,
                "csrf_invalid",
                "CSRF token missing or invalid".to_string(),
            ),

            // --- HTTP-specific errors ---
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
            AppError::RateLimited(decision) => return rate_limited_response(decision),
        };

        let body = json!({
            "error": code,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 429 with a `Retry-After` header in whole seconds plus the raw window data.
fn rate_limited_response(decision: &RateLimitDecision) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": "Too many requests, please try again later",
        "retryAfterMs": decision.retry_after_ms,
        "remaining": decision.remaining,
        "resetAt": decision.reset_at,
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(decision.retry_after_secs()),
    );
    response
}
