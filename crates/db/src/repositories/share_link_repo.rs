//! Repository for the `share_links` table.

use sqlx::PgPool;
use meterdeck_core::types::DbId;

use crate::models::share_link::{CreateShareLink, ShareLink};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, token, created_at, expires_at, password_protected, \
                        access_count, last_accessed_at, revoked_at, created_by";

/// Provides CRUD operations for share links.
pub struct ShareLinkRepo;

impl ShareLinkRepo {
    pub async fn create(pool: &PgPool, input: &CreateShareLink) -> Result<ShareLink, sqlx::Error> {
        let query = format!(
            "INSERT INTO share_links (token, expires_at, password_protected, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ShareLink>(&query)
            .bind(&input.token)
            .bind(input.expires_at)
            .bind(input.password_protected)
            .bind(&input.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<ShareLink>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM share_links WHERE token = $1");
        sqlx::query_as::<_, ShareLink>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    /// List all share links, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<ShareLink>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM share_links ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, ShareLink>(&query).fetch_all(pool).await
    }

    /// Bump the access counter and stamp the access time.
    pub async fn record_access(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE share_links SET
                access_count = access_count + 1,
                last_accessed_at = NOW()
             WHERE token = $1",
        )
        .bind(token)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a link revoked. `revoked_at` is never overwritten once set.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn revoke(pool: &PgPool, id: DbId) -> Result<Option<ShareLink>, sqlx::Error> {
        let query = format!(
            "UPDATE share_links SET revoked_at = COALESCE(revoked_at, NOW())
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ShareLink>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Delete links past their expiry. Returns the count of deleted rows.
    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM share_links WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
