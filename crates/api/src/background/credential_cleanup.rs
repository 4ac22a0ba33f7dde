//! Periodic purge of expired sessions and share links.
//!
//! Expired rows are already rejected on read; this only keeps tables small.
//! Errors are logged and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use meterdeck_db::CredentialStore;
use tokio_util::sync::CancellationToken;

/// Run the cleanup loop until `cancel` is triggered.
pub async fn run(store: Arc<dyn CredentialStore>, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Credential cleanup job started");

    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Credential cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                sweep_once(store.as_ref()).await;
            }
        }
    }
}

async fn sweep_once(store: &dyn CredentialStore) {
    match store.delete_expired_sessions().await {
        Ok(0) => tracing::debug!("Credential cleanup: no expired sessions"),
        Ok(deleted) => tracing::info!(deleted, "Credential cleanup: purged expired sessions"),
        Err(e) => tracing::error!(error = %e, "Credential cleanup: session purge failed"),
    }

    match store.delete_expired_share_links().await {
        Ok(0) => tracing::debug!("Credential cleanup: no expired share links"),
        Ok(deleted) => tracing::info!(deleted, "Credential cleanup: purged expired share links"),
        Err(e) => tracing::error!(error = %e, "Credential cleanup: share link purge failed"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use meterdeck_core::roles::Role;
    use meterdeck_db::models::session::CreateSession;
    use meterdeck_db::models::share_link::CreateShareLink;
    use meterdeck_db::models::user::CreateUser;
    use meterdeck_db::MemoryCredentialStore;

    use super::*;

    #[tokio::test]
    async fn purges_expired_rows_and_keeps_live_ones() {
        let store = Arc::new(MemoryCredentialStore::new());
        let user = store
            .create_user(&CreateUser {
                email: "ops@example.com".to_string(),
                password_hash: None,
                name: "Ops".to_string(),
                role: Role::Viewer,
            })
            .await
            .unwrap();

        let now = Utc::now();
        for (hash, offset) in [("expired", -1), ("live", 1)] {
            store
                .create_session(&CreateSession {
                    user_id: user.id,
                    token_hash: hash.to_string(),
                    expires_at: now + chrono::Duration::hours(offset),
                    user_agent: None,
                    ip_address: None,
                })
                .await
                .unwrap();
            store
                .create_share_link(&CreateShareLink {
                    token: format!("share-{hash}"),
                    expires_at: now + chrono::Duration::hours(offset),
                    password_protected: false,
                    created_by: "legacy".to_string(),
                })
                .await
                .unwrap();
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            store.clone(),
            Duration::from_millis(10),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        task.await.unwrap();

        assert!(store.find_session_by_token_hash("expired").await.unwrap().is_none());
        assert!(store.find_session_by_token_hash("live").await.unwrap().is_some());
        assert!(store.find_share_link_by_token("share-expired").await.unwrap().is_none());
        assert!(store.find_share_link_by_token("share-live").await.unwrap().is_some());
    }
}
