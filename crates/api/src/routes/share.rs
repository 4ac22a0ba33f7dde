//! Route definitions for the `/share` resource.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::share;
use crate::state::AppState;

/// Routes mounted at `/share`.
///
/// ```text
/// POST   /       -> create_share
/// GET    /       -> list_shares
/// DELETE /{id}   -> revoke_share
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(share::list_shares).post(share::create_share))
        .route("/{id}", delete(share::revoke_share))
}
