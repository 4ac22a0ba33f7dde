//! Handlers for share links: creation, listing and revocation.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use meterdeck_core::error::CoreError;
use meterdeck_core::types::{DbId, Timestamp};
use meterdeck_core::validation::clamp_share_expiry;
use meterdeck_db::models::share_link::{CreateShareLink, ShareLinkResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authority::SHARE_QUERY_PARAM;
use crate::error::AppResult;
use crate::middleware::csrf::CsrfProtected;
use crate::middleware::json::AppJson;
use crate::middleware::rate_limit::{RateLimit, ShareScope};
use crate::middleware::rbac::{CreateShare, ManageShares, RequirePermission};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /share`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    pub expires_in_hours: i64,
    /// Empty string means "no password".
    #[validate(length(max = 256))]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareResponse {
    pub url: String,
    pub token: String,
    pub expires_at: Timestamp,
    pub password_protected: bool,
}

/// POST /api/v1/share
///
/// Mint a read-only share token and return a ready-to-send dashboard URL.
pub async fn create_share(
    State(state): State<AppState>,
    _limit: RateLimit<ShareScope>,
    _csrf: CsrfProtected,
    auth: RequirePermission<CreateShare>,
    AppJson(input): AppJson<CreateShareRequest>,
) -> AppResult<Json<CreateShareResponse>> {
    input.validate()?;
    let hours = clamp_share_expiry(input.expires_in_hours)?;
    let password = input.password.as_deref().filter(|p| !p.is_empty());

    let codec = state.authority.codec()?;
    let expires_at = Utc::now() + chrono::Duration::hours(hours);
    let token = codec.issue_share_token_until(expires_at, password);

    let mut url = state.config.auth.public_base_url.clone();
    url.query_pairs_mut().append_pair(SHARE_QUERY_PARAM, &token);

    let record = CreateShareLink {
        token: token.clone(),
        expires_at,
        password_protected: password.is_some(),
        created_by: auth.identity.label(),
    };
    match state.store.create_share_link(&record).await {
        Ok(link) => tracing::info!(
            share_link_id = link.id,
            created_by = %record.created_by,
            expires_in_hours = hours,
            password_protected = record.password_protected,
            "Share link created"
        ),
        Err(e) => tracing::warn!(error = %e, "Failed to record share link"),
    }

    Ok(Json(CreateShareResponse {
        url: url.into(),
        token,
        expires_at,
        password_protected: record.password_protected,
    }))
}

/// GET /api/v1/share
pub async fn list_shares(
    State(state): State<AppState>,
    _auth: RequirePermission<ManageShares>,
) -> AppResult<Json<DataResponse<Vec<ShareLinkResponse>>>> {
    let links = state.store.list_share_links().await?;
    Ok(Json(DataResponse {
        data: links.iter().map(ShareLinkResponse::from).collect(),
    }))
}

/// DELETE /api/v1/share/{id}
///
/// Revoke a share link. Revoking twice keeps the original revocation time.
pub async fn revoke_share(
    State(state): State<AppState>,
    _csrf: CsrfProtected,
    auth: RequirePermission<ManageShares>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ShareLinkResponse>>> {
    let link = state
        .store
        .revoke_share_link(id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "ShareLink",
            id,
        })?;

    tracing::info!(
        share_link_id = id,
        revoked_by = %auth.identity.label(),
        "Share link revoked"
    );

    Ok(Json(DataResponse {
        data: ShareLinkResponse::from(&link),
    }))
}
