/// In-memory store backend.
///
/// Same contract as the Postgres backend behind std lock guards.
/// Integration tests run against this so the full HTTP surface is
/// exercised without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, StoreError};
use crate::store::{IssuedToken, NewUser, SessionStore, User, UserStore};

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

struct Inner {
    next_id: i64,
    users: BTreeMap<i64, User>,
    // Keyed by access token, the primary key.
    tokens: HashMap<String, IssuedToken>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                users: BTreeMap::new(),
                tokens: HashMap::new(),
            }),
        }
    }

    /// Number of issued-token rows held, revoked rows included.
    pub fn session_count(&self) -> usize {
        self.inner.read().map(|inner| inner.tokens.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, AppError> {
        self.inner
            .read()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, AppError> {
        self.inner
            .write()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let mut inner = self.write()?;

        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation(format!(
                "username {} already exists",
                user.username
            ))
            .into());
        }
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(format!(
                "email {} already exists",
                user.email
            ))
            .into());
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            email: user.email,
            role: user.role,
        };
        inner.users.insert(id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn update_password(&self, user_id: i64, new_hash: &str) -> Result<(), AppError> {
        let mut inner = self.write()?;
        match inner.users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = new_hash.to_string();
                Ok(())
            }
            None => Err(crate::error::AccountError::UserNotFound.into()),
        }
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        // BTreeMap iterates in key order, so this is already id ascending.
        Ok(self.read()?.users.values().cloned().collect())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn record(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.write()?;

        if inner.tokens.contains_key(access_token) {
            return Err(
                StoreError::UniqueViolation("access token already recorded".to_string()).into(),
            );
        }

        inner.tokens.insert(
            access_token.to_string(),
            IssuedToken {
                user_id,
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                active: true,
                issued_at: Utc::now(),
            },
        );

        Ok(())
    }

    async fn find_active(
        &self,
        user_id: i64,
        access_token: &str,
    ) -> Result<Option<IssuedToken>, AppError> {
        Ok(self
            .read()?
            .tokens
            .get(access_token)
            .filter(|t| t.user_id == user_id && t.active)
            .cloned())
    }

    async fn revoke(&self, access_token: &str) -> Result<(), AppError> {
        let mut inner = self.write()?;
        if let Some(token) = inner.tokens.get_mut(access_token) {
            token.active = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$12$hash".to_string(),
            role: Role::Customer,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();

        let alice = store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        let bob = store.insert(new_user("bob", "bob@x.com")).await.unwrap();

        assert_eq!(alice.id, 1);
        assert_eq!(bob.id, 2);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryStore::new();

        store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        let result = store.insert(new_user("alice", "other@x.com")).await;

        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::UniqueViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();

        store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        let result = store.insert(new_user("bob", "alice@x.com")).await;

        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::UniqueViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_lookups() {
        let store = MemoryStore::new();
        let alice = store.insert(new_user("alice", "alice@x.com")).await.unwrap();

        assert_eq!(
            store.find_by_id(alice.id).await.unwrap().unwrap().username,
            "alice"
        );
        assert_eq!(
            store
                .find_by_email("alice@x.com")
                .await
                .unwrap()
                .unwrap()
                .id,
            alice.id
        );
        assert_eq!(
            store.find_by_username("alice").await.unwrap().unwrap().id,
            alice.id
        );
        assert!(store.find_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_password() {
        let store = MemoryStore::new();
        let alice = store.insert(new_user("alice", "alice@x.com")).await.unwrap();

        store.update_password(alice.id, "$2b$12$newhash").await.unwrap();

        let updated = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "$2b$12$newhash");
    }

    #[tokio::test]
    async fn test_update_password_missing_user() {
        let store = MemoryStore::new();
        assert!(store.update_password(42, "$2b$12$hash").await.is_err());
    }

    #[tokio::test]
    async fn test_list_is_id_ascending() {
        let store = MemoryStore::new();
        store.insert(new_user("alice", "alice@x.com")).await.unwrap();
        store.insert(new_user("bob", "bob@x.com")).await.unwrap();

        let users = store.list().await.unwrap();
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_record_and_find_active() {
        let store = MemoryStore::new();

        store.record(1, "access-1", "refresh-1").await.unwrap();

        let found = store.find_active(1, "access-1").await.unwrap().unwrap();
        assert_eq!(found.user_id, 1);
        assert_eq!(found.refresh_token, "refresh-1");
        assert!(found.active);
    }

    #[tokio::test]
    async fn test_find_active_requires_exact_triple() {
        let store = MemoryStore::new();
        store.record(1, "access-1", "refresh-1").await.unwrap();

        // Wrong owner.
        assert!(store.find_active(2, "access-1").await.unwrap().is_none());
        // Unknown token.
        assert!(store.find_active(1, "access-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_access_token_rejected() {
        let store = MemoryStore::new();
        store.record(1, "access-1", "refresh-1").await.unwrap();

        let result = store.record(1, "access-1", "refresh-2").await;
        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::UniqueViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_revoke_hides_row_from_find_active() {
        let store = MemoryStore::new();
        store.record(1, "access-1", "refresh-1").await.unwrap();

        store.revoke("access-1").await.unwrap();

        assert!(store.find_active(1, "access-1").await.unwrap().is_none());
        // The row itself is kept.
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test]
    async fn test_revoke_missing_token_is_noop() {
        let store = MemoryStore::new();
        assert!(store.revoke("never-issued").await.is_ok());
    }

    #[tokio::test]
    async fn test_multiple_sessions_per_user() {
        let store = MemoryStore::new();

        store.record(1, "access-1", "refresh-1").await.unwrap();
        store.record(1, "access-2", "refresh-2").await.unwrap();

        assert!(store.find_active(1, "access-1").await.unwrap().is_some());
        assert!(store.find_active(1, "access-2").await.unwrap().is_some());
        assert_eq!(store.session_count(), 2);
    }
}
