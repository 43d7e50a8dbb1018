use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{EphemeralToken, User};
use crate::db::store::AuthStore;
use crate::error::{Error, StorageError};

/// In-memory implementation of the persistence collaborator, used by the
/// test suite and for local development without a database. Not durable.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    tokens: RwLock<HashMap<String, EphemeralToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, Error> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<User, Error> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(Error::Storage(StorageError::Duplicate));
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn update_user_password(&self, id: Uuid, password_hash: &str) -> Result<(), Error> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(Error::Storage(StorageError::NotFound))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_user_blocked(&self, id: Uuid, blocked: bool) -> Result<(), Error> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(Error::Storage(StorageError::NotFound))?;
        user.blocked = blocked;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid) -> Result<(), Error> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(Error::Storage(StorageError::NotFound))?;
        user.email_verified = true;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn create_ephemeral_token(&self, token: &EphemeralToken) -> Result<(), Error> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.token) {
            return Err(Error::Storage(StorageError::Duplicate));
        }
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_ephemeral_token(&self, token: &str) -> Result<Option<EphemeralToken>, Error> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(token).cloned())
    }

    async fn mark_ephemeral_token_used(&self, token: &str) -> Result<(), Error> {
        let mut tokens = self.tokens.write().await;
        let row = tokens.get_mut(token).ok_or(Error::Storage(StorageError::NotFound))?;
        row.used = true;
        Ok(())
    }
}
