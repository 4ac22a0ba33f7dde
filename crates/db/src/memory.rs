//! In-process [`CredentialStore`] used when no database is configured.
//!
//! Enforces the same uniqueness and cascade rules as the SQL schema so the
//! auth layer behaves identically against either backend.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use meterdeck_core::types::DbId;

use crate::models::session::{CreateSession, Session};
use crate::models::share_link::{CreateShareLink, ShareLink};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::store::{CredentialStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<DbId, User>,
    sessions: BTreeMap<DbId, Session>,
    share_links: BTreeMap<DbId, ShareLink>,
    next_user_id: DbId,
    next_session_id: DbId,
    next_share_link_id: DbId,
}

impl Tables {
    fn next_id(counter: &mut DbId) -> DbId {
        *counter += 1;
        *counter
    }

    fn email_taken(&self, email: &str, except: Option<DbId>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tables: Mutex<Tables>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("credential store lock poisoned".into()))
    }
}

fn email_conflict() -> StoreError {
    StoreError::Conflict("A user with this email already exists".into())
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        let mut tables = self.tables()?;
        let email = input.email.to_lowercase();
        if tables.email_taken(&email, None) {
            return Err(email_conflict());
        }

        let now = Utc::now();
        let id = Tables::next_id(&mut tables.next_user_id);
        let user = User {
            id,
            email,
            password_hash: input.password_hash.clone(),
            name: input.name.clone(),
            role: input.role.as_str().to_string(),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_lowercase();
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.tables()?.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(users)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        Ok(self.tables()?.users.len() as i64)
    }

    async fn update_user(&self, id: DbId, input: &UpdateUser) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables()?;
        let email = input.email.as_deref().map(str::to_lowercase);
        if let Some(email) = &email {
            if tables.email_taken(email, Some(id)) {
                return Err(email_conflict());
            }
        }

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(name) = &input.name {
            user.name = name.clone();
        }
        if let Some(role) = input.role {
            user.role = role.as_str().to_string();
        }
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        Ok(match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = Some(password_hash.to_string());
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn record_login(&self, id: DbId) -> Result<(), StoreError> {
        if let Some(user) = self.tables()?.users.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete_user(&self, id: DbId) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        let removed = tables.users.remove(&id).is_some();
        if removed {
            tables.sessions.retain(|_, s| s.user_id != id);
        }
        Ok(removed)
    }

    async fn create_session(&self, input: &CreateSession) -> Result<Session, StoreError> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&input.user_id) {
            return Err(StoreError::Unavailable(format!(
                "session references missing user {}",
                input.user_id
            )));
        }
        if tables
            .sessions
            .values()
            .any(|s| s.token_hash == input.token_hash)
        {
            return Err(StoreError::Conflict(
                "Duplicate value violates unique constraint: uq_sessions_token_hash".into(),
            ));
        }

        let id = Tables::next_id(&mut tables.next_session_id);
        let session = Session {
            id,
            user_id: input.user_id,
            token_hash: input.token_hash.clone(),
            created_at: Utc::now(),
            expires_at: input.expires_at,
            user_agent: input.user_agent.clone(),
            ip_address: input.ip_address.clone(),
        };
        tables.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn find_session_by_token_hash(&self, hash: &str) -> Result<Option<Session>, StoreError> {
        Ok(self
            .tables()?
            .sessions
            .values()
            .find(|s| s.token_hash == hash)
            .cloned())
    }

    async fn delete_session_by_token_hash(&self, hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.token_hash != hash);
        Ok(tables.sessions.len() < before)
    }

    async fn delete_sessions_for_user(&self, user_id: DbId) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn create_share_link(&self, input: &CreateShareLink) -> Result<ShareLink, StoreError> {
        let mut tables = self.tables()?;
        if tables.share_links.values().any(|l| l.token == input.token) {
            return Err(StoreError::Conflict(
                "Duplicate value violates unique constraint: uq_share_links_token".into(),
            ));
        }

        let id = Tables::next_id(&mut tables.next_share_link_id);
        let link = ShareLink {
            id,
            token: input.token.clone(),
            created_at: Utc::now(),
            expires_at: input.expires_at,
            password_protected: input.password_protected,
            access_count: 0,
            last_accessed_at: None,
            revoked_at: None,
            created_by: input.created_by.clone(),
        };
        tables.share_links.insert(id, link.clone());
        Ok(link)
    }

    async fn find_share_link_by_token(&self, token: &str) -> Result<Option<ShareLink>, StoreError> {
        Ok(self
            .tables()?
            .share_links
            .values()
            .find(|l| l.token == token)
            .cloned())
    }

    async fn list_share_links(&self) -> Result<Vec<ShareLink>, StoreError> {
        let mut links: Vec<ShareLink> = self.tables()?.share_links.values().cloned().collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(links)
    }

    async fn record_share_access(&self, token: &str) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if let Some(link) = tables.share_links.values_mut().find(|l| l.token == token) {
            link.access_count += 1;
            link.last_accessed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn revoke_share_link(&self, id: DbId) -> Result<Option<ShareLink>, StoreError> {
        let mut tables = self.tables()?;
        Ok(tables.share_links.get_mut(&id).map(|link| {
            link.revoked_at.get_or_insert_with(Utc::now);
            link.clone()
        }))
    }

    async fn delete_expired_share_links(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables()?;
        let before = tables.share_links.len();
        tables.share_links.retain(|_, l| l.expires_at > now);
        Ok((before - tables.share_links.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.tables().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use meterdeck_core::roles::Role;

    use super::*;

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            password_hash: Some("$argon2id$fake".to_string()),
            name: "Test User".to_string(),
            role: Role::Developer,
        }
    }

    fn new_session(user_id: DbId, hash: &str, ttl: chrono::Duration) -> CreateSession {
        CreateSession {
            user_id,
            token_hash: hash.to_string(),
            expires_at: Utc::now() + ttl,
            user_agent: None,
            ip_address: Some("127.0.0.1".to_string()),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_case_insensitively() {
        let store = MemoryCredentialStore::new();
        store.create_user(&new_user("dev@example.com")).await.unwrap();

        let err = store
            .create_user(&new_user("DEV@example.com"))
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::Conflict(_));
    }

    #[tokio::test]
    async fn email_lookup_is_case_folded() {
        let store = MemoryCredentialStore::new();
        let created = store.create_user(&new_user("Dev@Example.com")).await.unwrap();
        assert_eq!(created.email, "dev@example.com");

        let found = store.find_user_by_email("DEV@EXAMPLE.COM").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn update_to_taken_email_conflicts() {
        let store = MemoryCredentialStore::new();
        store.create_user(&new_user("a@example.com")).await.unwrap();
        let b = store.create_user(&new_user("b@example.com")).await.unwrap();

        let update = UpdateUser {
            email: Some("a@example.com".into()),
            ..Default::default()
        };
        assert_matches!(
            store.update_user(b.id, &update).await,
            Err(StoreError::Conflict(_))
        );

        let rename = UpdateUser {
            name: Some("Bee".into()),
            role: Some(Role::Billing),
            ..Default::default()
        };
        let updated = store.update_user(b.id, &rename).await.unwrap().unwrap();
        assert_eq!(updated.name, "Bee");
        assert_eq!(updated.role, "billing");
        assert_eq!(updated.email, "b@example.com");
    }

    #[tokio::test]
    async fn deleting_user_cascades_sessions() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(&new_user("a@example.com")).await.unwrap();
        store
            .create_session(&new_session(user.id, "h1", chrono::Duration::days(1)))
            .await
            .unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(store.find_session_by_token_hash("h1").await.unwrap().is_none());
        assert!(!store.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn session_requires_existing_user() {
        let store = MemoryCredentialStore::new();
        assert!(store
            .create_session(&new_session(99, "h", chrono::Duration::days(1)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn expired_sessions_are_swept() {
        let store = MemoryCredentialStore::new();
        let user = store.create_user(&new_user("a@example.com")).await.unwrap();
        store
            .create_session(&new_session(user.id, "old", chrono::Duration::seconds(-5)))
            .await
            .unwrap();
        store
            .create_session(&new_session(user.id, "new", chrono::Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(store.delete_expired_sessions().await.unwrap(), 1);
        assert!(store.find_session_by_token_hash("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn share_link_access_and_revocation() {
        let store = MemoryCredentialStore::new();
        let link = store
            .create_share_link(&CreateShareLink {
                token: "tok".into(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
                password_protected: false,
                created_by: "admin@example.com".into(),
            })
            .await
            .unwrap();

        store.record_share_access("tok").await.unwrap();
        store.record_share_access("tok").await.unwrap();
        let found = store.find_share_link_by_token("tok").await.unwrap().unwrap();
        assert_eq!(found.access_count, 2);
        assert!(found.last_accessed_at.is_some());

        let revoked = store.revoke_share_link(link.id).await.unwrap().unwrap();
        let first_revocation = revoked.revoked_at.unwrap();
        let again = store.revoke_share_link(link.id).await.unwrap().unwrap();
        assert_eq!(again.revoked_at, Some(first_revocation), "revokedAt is never rewritten");

        assert!(store.revoke_share_link(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_share_links_are_swept() {
        let store = MemoryCredentialStore::new();
        for (token, hours) in [("old", -1), ("live", 1)] {
            store
                .create_share_link(&CreateShareLink {
                    token: token.into(),
                    expires_at: Utc::now() + chrono::Duration::hours(hours),
                    password_protected: false,
                    created_by: "legacy".into(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.delete_expired_share_links().await.unwrap(), 1);
        assert_eq!(store.list_share_links().await.unwrap().len(), 1);
    }
}
