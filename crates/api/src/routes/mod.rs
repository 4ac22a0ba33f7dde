pub mod auth;
pub mod health;
pub mod share;
pub mod usage;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// GET    /csrf                  CSRF token + cookie
/// POST   /login                 start a session
/// POST   /logout                end the session
/// GET    /session               how this request is authorized
///
/// POST   /share                 mint a share link
/// GET    /share                 list share links
/// DELETE /share/{id}            revoke a share link
///
/// GET    /usage                 dashboard payload (session or share token)
///
/// GET    /users                 list users            (accounts mode)
/// POST   /users                 create user           (accounts mode)
/// GET    /users/{id}            get user              (accounts mode)
/// PUT    /users/{id}            update user           (accounts mode)
/// DELETE /users/{id}            delete user           (accounts mode)
/// PUT    /users/{id}/password   set password          (accounts mode)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/share", share::router())
        .merge(usage::router())
        .nest("/users", users::router())
}
