use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::HttpRequest;
use chrono::Duration;
use tracing::{debug, warn};

use crate::auth::token::{Identity, TokenCodec};
use crate::db::store::AuthStore;
use crate::error::Error;

pub const SESSION_COOKIE: &str = "storefront_session";

/// Resolution of an inbound request's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No cookie, or a cookie that fails verification. Invalid tokens are
    /// never partially trusted; the request is fully anonymous.
    Anonymous,
    Active(Identity),
    /// The token verifies but the account is gone or blocked. The caller
    /// must attach `clear_cookie()` to the response so the browser stops
    /// presenting the dead credential.
    Revoked,
}

/// Wraps the token codec with browser cookie semantics: issuing,
/// resolving, and clearing the session credential. The two lifetime
/// classes come from configuration so cookie max-age and token expiry
/// always agree.
pub struct SessionManager {
    codec: TokenCodec,
    secure: bool,
    session_ttl: Duration,
    remember_ttl: Duration,
}

impl SessionManager {
    /// `secure` should be true everywhere except local development, so
    /// the cookie is only sent over HTTPS.
    pub fn new(secret: &str, secure: bool, session_ttl: Duration, remember_ttl: Duration) -> Self {
        Self { codec: TokenCodec::new(secret), secure, session_ttl, remember_ttl }
    }

    /// Issues the session cookie for a fresh login. Remembered logins get
    /// a max-age matching the extended token lifetime; others are
    /// session-scoped (no max-age, dropped when the browser closes).
    pub fn issue_cookie(&self, identity: &Identity, remember: bool) -> Result<Cookie<'static>, Error> {
        let ttl = if remember { self.remember_ttl } else { self.session_ttl };
        let token = self
            .codec
            .issue(identity, ttl)
            .map_err(|_| Error::Internal("session token encoding failed".into()))?;

        let mut builder = Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure);

        if remember {
            builder = builder.max_age(CookieDuration::seconds(self.remember_ttl.num_seconds()));
        }

        Ok(builder.finish())
    }

    /// Resolves the current session. A cryptographically valid token is
    /// not enough: the referenced account must still exist and not be
    /// blocked, so a blocked account's outstanding sessions die on their
    /// next use.
    pub async fn resolve(
        &self,
        req: &HttpRequest,
        store: &dyn AuthStore,
    ) -> Result<SessionState, Error> {
        let cookie = match req.cookie(SESSION_COOKIE) {
            Some(cookie) => cookie,
            None => return Ok(SessionState::Anonymous),
        };

        let claims = match self.codec.verify(cookie.value()) {
            Ok(claims) => claims,
            Err(_) => {
                debug!("session cookie failed verification");
                return Ok(SessionState::Anonymous);
            }
        };

        match store.find_user_by_id(claims.sub).await? {
            Some(user) if !user.blocked => Ok(SessionState::Active(claims.into())),
            Some(user) => {
                warn!(user_id = %user.id, "session presented for blocked account");
                Ok(SessionState::Revoked)
            }
            None => {
                warn!(user_id = %claims.sub, "session presented for deleted account");
                Ok(SessionState::Revoked)
            }
        }
    }

    /// An expired cookie that overwrites the session credential. Used on
    /// logout and whenever `resolve` reports `Revoked`.
    pub fn clear_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .finish();
        cookie.make_removal();
        cookie
    }
}
