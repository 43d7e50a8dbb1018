use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{EphemeralToken, TokenPurpose};
use crate::db::store::AuthStore;
use crate::error::{Error, TokenLifecycleError};

const TOKEN_BYTES: usize = 32;

/// Generates the opaque token string. Unlike a session token this is not
/// a signed structure; all authority comes from the persisted row, the
/// string is only a high-entropy lookup key.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Lifecycle manager for single-use, time-boxed tokens. One instance
/// serves both purposes; the purpose rides along as a column and selects
/// the TTL.
pub struct EphemeralTokens;

impl EphemeralTokens {
    /// Issues and persists a fresh token. Outstanding unused tokens for
    /// the same user and purpose stay valid; each one is still single-use
    /// and short-lived.
    pub async fn issue(
        store: &dyn AuthStore,
        user_id: Uuid,
        purpose: TokenPurpose,
    ) -> Result<String, Error> {
        let token = generate_token();
        let row = EphemeralToken::new(token.clone(), user_id, purpose);
        store.create_ephemeral_token(&row).await?;
        info!(user_id = %user_id, ?purpose, "issued ephemeral token");
        Ok(token)
    }

    /// Looks up the token and checks purpose, expiry, and the used flag.
    /// The three failure causes are reported distinctly so the UI can say
    /// "expired" vs "already used" vs "invalid".
    pub async fn validate(
        store: &dyn AuthStore,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<Uuid, Error> {
        let row = store
            .find_ephemeral_token(token)
            .await?
            .ok_or(TokenLifecycleError::NotFound)?;

        // A reset token presented to the verification flow (or vice
        // versa) is treated as unknown.
        if row.purpose != purpose {
            return Err(TokenLifecycleError::NotFound.into());
        }
        if row.used {
            return Err(TokenLifecycleError::AlreadyUsed.into());
        }
        if row.is_expired() {
            return Err(TokenLifecycleError::Expired.into());
        }

        Ok(row.user_id)
    }

    /// Marks the token consumed. Call only after the action it gates has
    /// been durably applied; a crash between the two leaves the token
    /// replayable until it expires, which is an accepted risk.
    pub async fn consume(store: &dyn AuthStore, token: &str) -> Result<(), Error> {
        store.mark_ephemeral_token_used(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::{Duration, Utc};

    #[test]
    fn test_generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        // 32 bytes of entropy, base64: 43 chars unpadded
        assert_eq!(a.len(), 43);
    }

    #[tokio::test]
    async fn test_single_use_roundtrip() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        let token = EphemeralTokens::issue(&store, user_id, TokenPurpose::PasswordReset)
            .await
            .unwrap();

        let found = EphemeralTokens::validate(&store, &token, TokenPurpose::PasswordReset)
            .await
            .unwrap();
        assert_eq!(found, user_id);

        EphemeralTokens::consume(&store, &token).await.unwrap();

        match EphemeralTokens::validate(&store, &token, TokenPurpose::PasswordReset).await {
            Err(Error::TokenLifecycle(TokenLifecycleError::AlreadyUsed)) => (),
            other => panic!("expected already-used, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_unknown_token_not_found() {
        let store = MemoryStore::new();
        match EphemeralTokens::validate(&store, "no-such-token", TokenPurpose::PasswordReset).await
        {
            Err(Error::TokenLifecycle(TokenLifecycleError::NotFound)) => (),
            other => panic!("expected not-found, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_expired_token_reported_distinctly() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        let mut row =
            EphemeralToken::new(generate_token(), user_id, TokenPurpose::PasswordReset);
        row.expires_at = Utc::now() - Duration::seconds(1);
        store.create_ephemeral_token(&row).await.unwrap();

        match EphemeralTokens::validate(&store, &row.token, TokenPurpose::PasswordReset).await {
            Err(Error::TokenLifecycle(TokenLifecycleError::Expired)) => (),
            other => panic!("expected expired, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_expired_and_used_token_reports_used() {
        // Both terminal states hold; used wins so the UI never invites a
        // retry of a consumed token.
        let store = MemoryStore::new();
        let mut row =
            EphemeralToken::new(generate_token(), Uuid::new_v4(), TokenPurpose::PasswordReset);
        row.expires_at = Utc::now() - Duration::seconds(1);
        row.used = true;
        store.create_ephemeral_token(&row).await.unwrap();

        match EphemeralTokens::validate(&store, &row.token, TokenPurpose::PasswordReset).await {
            Err(Error::TokenLifecycle(TokenLifecycleError::AlreadyUsed)) => (),
            other => panic!("expected already-used, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_purpose_mismatch_is_not_found() {
        let store = MemoryStore::new();
        let token = EphemeralTokens::issue(&store, Uuid::new_v4(), TokenPurpose::EmailVerification)
            .await
            .unwrap();

        match EphemeralTokens::validate(&store, &token, TokenPurpose::PasswordReset).await {
            Err(Error::TokenLifecycle(TokenLifecycleError::NotFound)) => (),
            other => panic!("expected not-found, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_multiple_outstanding_tokens_coexist() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        let first = EphemeralTokens::issue(&store, user_id, TokenPurpose::PasswordReset)
            .await
            .unwrap();
        let second = EphemeralTokens::issue(&store, user_id, TokenPurpose::PasswordReset)
            .await
            .unwrap();

        // Issuing a second token does not invalidate the first
        assert!(EphemeralTokens::validate(&store, &first, TokenPurpose::PasswordReset)
            .await
            .is_ok());
        assert!(EphemeralTokens::validate(&store, &second, TokenPurpose::PasswordReset)
            .await
            .is_ok());
    }
}
