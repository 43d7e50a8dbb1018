use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::models::{EphemeralToken, User};
use crate::db::store::AuthStore;
use crate::error::{Error, StorageError};

const USER_COLUMNS: &str = "id, email, password_hash, display_name, role, blocked, \
     email_verified, created_at, updated_at";

/// Postgres-backed implementation of the persistence collaborator.
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| Error::Storage(StorageError::ConnectionError(e.to_string())))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn create_user(&self, user: &User) -> Result<User, Error> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, password_hash, display_name, role, blocked, \
             email_verified, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.role)
        .bind(user.blocked)
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint().is_some() => {
                Error::Storage(StorageError::Duplicate)
            }
            _ => e.into(),
        })?;

        Ok(created)
    }

    async fn update_user_password(&self, id: Uuid, password_hash: &str) -> Result<(), Error> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn set_user_blocked(&self, id: Uuid, blocked: bool) -> Result<(), Error> {
        sqlx::query("UPDATE users SET blocked = $1, updated_at = $2 WHERE id = $3")
            .bind(blocked)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid) -> Result<(), Error> {
        sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_ephemeral_token(&self, token: &EphemeralToken) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO ephemeral_tokens (token, user_id, purpose, expires_at, used, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.purpose)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn find_ephemeral_token(&self, token: &str) -> Result<Option<EphemeralToken>, Error> {
        let row = sqlx::query_as::<_, EphemeralToken>(
            "SELECT token, user_id, purpose, expires_at, used, created_at \
             FROM ephemeral_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    async fn mark_ephemeral_token_used(&self, token: &str) -> Result<(), Error> {
        let result = sqlx::query("UPDATE ephemeral_tokens SET used = TRUE WHERE token = $1")
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Storage(StorageError::NotFound));
        }
        Ok(())
    }
}
