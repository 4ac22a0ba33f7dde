//! Share link bookkeeping model and DTOs.
//!
//! A share token is self-verifying; these rows add revocation and access
//! auditing on top of it.

use meterdeck_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `share_links` table.
#[derive(Debug, Clone, FromRow)]
pub struct ShareLink {
    pub id: DbId,
    pub token: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub password_protected: bool,
    pub access_count: i64,
    pub last_accessed_at: Option<Timestamp>,
    pub revoked_at: Option<Timestamp>,
    pub created_by: String,
}

impl ShareLink {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Listing representation; omits the bearer token itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkResponse {
    pub id: DbId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub password_protected: bool,
    pub access_count: i64,
    pub last_accessed_at: Option<Timestamp>,
    pub revoked_at: Option<Timestamp>,
    pub created_by: String,
}

impl From<&ShareLink> for ShareLinkResponse {
    fn from(link: &ShareLink) -> Self {
        Self {
            id: link.id,
            created_at: link.created_at,
            expires_at: link.expires_at,
            password_protected: link.password_protected,
            access_count: link.access_count,
            last_accessed_at: link.last_accessed_at,
            revoked_at: link.revoked_at,
            created_by: link.created_by.clone(),
        }
    }
}

/// DTO for recording a newly issued share token.
#[derive(Debug, Clone)]
pub struct CreateShareLink {
    pub token: String,
    pub expires_at: Timestamp,
    pub password_protected: bool,
    pub created_by: String,
}
