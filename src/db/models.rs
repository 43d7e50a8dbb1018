use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    /// Where a user of this role lands after login, and where they are
    /// sent when they wander into the other role's area.
    pub fn default_area(&self) -> &'static str {
        match self {
            Role::Customer => "/account",
            Role::Admin => "/admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub blocked: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            display_name,
            role: Role::Customer,
            blocked: false,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What a password-reset or email-verification token is for. The two
/// flows share one lifecycle but differ in how long a token stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "token_purpose", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    PasswordReset,
    EmailVerification,
}

impl TokenPurpose {
    pub fn ttl(&self) -> Duration {
        match self {
            TokenPurpose::PasswordReset => Duration::hours(1),
            TokenPurpose::EmailVerification => Duration::hours(24),
        }
    }
}

/// Single-use, time-boxed credential row. All authority comes from this
/// row; the token string itself is just a high-entropy lookup key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EphemeralToken {
    pub token: String,
    pub user_id: Uuid,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl EphemeralToken {
    pub fn new(token: String, user_id: Uuid, purpose: TokenPurpose) -> Self {
        let now = Utc::now();
        Self {
            token,
            user_id,
            purpose,
            expires_at: now + purpose.ttl(),
            used: false,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
