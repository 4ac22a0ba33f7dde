//! Route definitions for CSRF, login and session endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes merged at the `/api/v1` root.
///
/// ```text
/// GET  /csrf     -> csrf_token
/// POST /login    -> login
/// POST /logout   -> logout
/// GET  /session  -> session
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/csrf", get(auth::csrf_token))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/session", get(auth::session))
}
