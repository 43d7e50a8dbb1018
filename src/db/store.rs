use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{EphemeralToken, User};
use crate::error::Error;

/// Persistence collaborator consumed by the auth core. The surrounding
/// application supplies user records, password hashes, and token rows
/// through this interface; every operation is a single-row atomic step,
/// no multi-row transactions are required.
///
/// A timeout or connection failure surfaces as `Error::Storage`; callers
/// must treat that as a failed lookup, never as "valid by default".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Lookup by email. Callers pass the lowercased form; the store does
    /// no normalization of its own.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, Error>;

    async fn create_user(&self, user: &User) -> Result<User, Error>;

    async fn update_user_password(&self, id: Uuid, password_hash: &str) -> Result<(), Error>;

    async fn set_user_blocked(&self, id: Uuid, blocked: bool) -> Result<(), Error>;

    async fn set_email_verified(&self, id: Uuid) -> Result<(), Error>;

    async fn create_ephemeral_token(&self, token: &EphemeralToken) -> Result<(), Error>;

    async fn find_ephemeral_token(&self, token: &str) -> Result<Option<EphemeralToken>, Error>;

    /// Marks the token consumed. Absorbing: once set it is never unset.
    /// Fails with `StorageError::NotFound` when no such token exists.
    async fn mark_ephemeral_token_used(&self, token: &str) -> Result<(), Error>;
}
