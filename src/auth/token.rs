use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::Role;

/// Identity payload baked into every session token. Immutable for the
/// life of the token; a role change requires issuing a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,    // User ID
    pub email: String,
    pub role: Role,
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity { user_id: claims.sub, email: claims.email, role: claims.role }
    }
}

/// Verification failure. Signature mismatch, malformed structure, and
/// expiry all collapse here so a caller (or an attacker observing one)
/// cannot tell tampering apart from expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidToken;

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // No grace period: a token one second past exp is invalid.
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Bakes `now + ttl` into the expiry claim. The codec is
    /// lifetime-agnostic; the session layer chooses the duration.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, InvalidToken> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            role: identity.role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| InvalidToken)
    }

    /// On failure the caller must treat the request as fully anonymous;
    /// no claim field of an invalid token is ever trusted.
    pub fn verify(&self, token: &str) -> Result<Claims, InvalidToken> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| InvalidToken)
    }

    #[cfg(test)]
    pub(crate) fn issue_with_expiry(
        &self,
        identity: &Identity,
        exp: i64,
    ) -> Result<String, InvalidToken> {
        let claims = Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            role: identity.role,
            exp,
            iat: Utc::now().timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            role: Role::Customer,
        }
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let codec = TokenCodec::new("test_secret");
        let identity = identity();

        let token = codec.issue(&identity, Duration::hours(2)).unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.sub, identity.user_id);
        assert_eq!(claims.email, identity.email);
        assert_eq!(claims.role, Role::Customer);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_ttl_drives_expiry_claim() {
        let codec = TokenCodec::new("test_secret");

        let token = codec.issue(&identity(), Duration::hours(7)).unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 7 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let codec = TokenCodec::new("test_secret");
        let other = TokenCodec::new("other_secret");

        let token = codec.issue(&identity(), Duration::hours(2)).unwrap();
        assert_eq!(other.verify(&token).unwrap_err(), InvalidToken);
    }

    #[test]
    fn test_malformed_token_rejected() {
        let codec = TokenCodec::new("test_secret");
        assert_eq!(codec.verify("not.a.token").unwrap_err(), InvalidToken);
        assert_eq!(codec.verify("").unwrap_err(), InvalidToken);
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = TokenCodec::new("test_secret");
        let past = Utc::now().timestamp() - 120;
        let token = codec.issue_with_expiry(&identity(), past).unwrap();

        assert_eq!(codec.verify(&token).unwrap_err(), InvalidToken);
    }

    #[test]
    fn test_rejection_causes_are_indistinguishable() {
        // Tampered and expired tokens fail with the same unit error.
        let codec = TokenCodec::new("test_secret");

        let expired = codec
            .issue_with_expiry(&identity(), Utc::now().timestamp() - 120)
            .unwrap();
        let mut tampered = codec.issue(&identity(), Duration::hours(2)).unwrap();
        tampered.push('x');

        assert_eq!(codec.verify(&expired).unwrap_err(), codec.verify(&tampered).unwrap_err());
    }
}
