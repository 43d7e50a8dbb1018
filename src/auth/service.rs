use actix_web::cookie::Cookie;
use actix_web::HttpRequest;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::credentials::{self, PasswordPolicy};
use crate::auth::ephemeral::EphemeralTokens;
use crate::auth::guard::{AccessDecision, CallerKind, RouteTable};
use crate::auth::session::{SessionManager, SessionState};
use crate::auth::throttle::{LoginThrottle, ThrottleConfig};
use crate::auth::token::Identity;
use crate::config::Settings;
use crate::db::models::{Role, TokenPurpose, User};
use crate::db::store::AuthStore;
use crate::email::{EmailDispatch, Mailer};
use crate::error::{Error, StorageError};

/// Strict input schema for registration; validated before any business
/// logic runs.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Strict input schema for login.
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub remember: bool,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub identity: Identity,
    pub cookie: Cookie<'static>,
}

/// Result of evaluating a request against the route table, plus whether
/// the response must clear a revoked session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    pub decision: AccessDecision,
    pub clear_session: bool,
}

/// The interface this core exposes to the rest of the storefront.
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    mailer: Arc<dyn Mailer>,
    sessions: SessionManager,
    throttle: LoginThrottle,
    routes: RouteTable,
    policy: PasswordPolicy,
}

impl AuthService {
    /// Fails with a configuration error before anything runs when the
    /// signing secret or storage descriptor is unusable.
    pub fn new(
        settings: &Settings,
        store: Arc<dyn AuthStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, Error> {
        settings.validate()?;

        Ok(Self {
            store,
            mailer,
            sessions: SessionManager::new(
                &settings.auth.jwt_secret,
                settings.is_production(),
                chrono::Duration::hours(settings.auth.session_hours),
                chrono::Duration::days(settings.auth.remember_me_days),
            ),
            throttle: LoginThrottle::new(ThrottleConfig {
                max_attempts: settings.throttle.max_attempts,
                window: chrono::Duration::minutes(settings.throttle.window_minutes),
            }),
            routes: RouteTable::default(),
            policy: PasswordPolicy::default(),
        })
    }

    pub async fn register(&self, input: RegisterInput) -> Result<(Identity, EmailDispatch), Error> {
        let email = normalize_email(&input.email)?;
        self.policy.check(&input.password)?;

        let password_hash = credentials::hash_password(&input.password)?;
        let user = User::new(email.clone(), password_hash, input.display_name.clone());

        let created = match self.store.create_user(&user).await {
            Err(Error::Storage(StorageError::Duplicate)) => {
                return Err(Error::invalid_input("Email is already registered"));
            }
            other => other?,
        };
        info!(user_id = %created.id, "account created");

        // Verification email failure never fails the registration
        let dispatch = self.dispatch_verification(&created).await;

        let identity = Identity {
            user_id: created.id,
            email: created.email,
            role: created.role,
        };
        Ok((identity, dispatch))
    }

    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, Error> {
        let email = normalize_email(&input.email)?;
        if input.password.is_empty() {
            return Err(Error::invalid_input("Password is required"));
        }

        self.throttle.attempt(&email).await?;

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                // Burn the same hashing work as a real check, then fail
                // with the uniform message.
                credentials::dummy_verify(&input.password);
                self.throttle.record_failure(&email).await;
                return Err(Error::InvalidCredentials);
            }
        };

        if !credentials::verify_password(&input.password, &user.password_hash)? {
            self.throttle.record_failure(&email).await;
            return Err(Error::InvalidCredentials);
        }

        // Only after the credentials check out does the caller learn the
        // account state.
        if user.blocked {
            warn!(user_id = %user.id, "login refused for blocked account");
            return Err(Error::AccountBlocked);
        }

        let identity = Identity { user_id: user.id, email: user.email, role: user.role };
        let cookie = self.sessions.issue_cookie(&identity, input.remember)?;
        info!(user_id = %identity.user_id, remember = input.remember, "login succeeded");

        Ok(LoginOutcome { identity, cookie })
    }

    pub async fn current_identity(&self, req: &HttpRequest) -> Result<SessionState, Error> {
        self.sessions.resolve(req, self.store.as_ref()).await
    }

    pub async fn require_role(&self, req: &HttpRequest, role: Role) -> Result<Identity, Error> {
        match self.sessions.resolve(req, self.store.as_ref()).await? {
            SessionState::Active(identity) if identity.role == role => Ok(identity),
            SessionState::Active(_) => Err(Error::Forbidden),
            SessionState::Anonymous | SessionState::Revoked => Err(Error::Unauthenticated),
        }
    }

    /// Classifies the request's path and decides whether to proceed,
    /// redirect, or reject. `clear_session` is set when a revoked session
    /// cookie must be removed from the browser with this response.
    pub async fn authorize(
        &self,
        req: &HttpRequest,
        caller: CallerKind,
    ) -> Result<AccessOutcome, Error> {
        let state = self.sessions.resolve(req, self.store.as_ref()).await?;
        let (identity, clear_session) = match &state {
            SessionState::Active(identity) => (Some(identity), false),
            SessionState::Anonymous => (None, false),
            SessionState::Revoked => (None, true),
        };

        let decision = self.routes.evaluate(req.path(), identity, caller);
        Ok(AccessOutcome { decision, clear_session })
    }

    /// Always reports success to the caller; whether the email exists is
    /// never revealed. The dispatch flag is `Sent` for unknown emails for
    /// the same reason.
    pub async fn request_password_reset(&self, email: &str) -> Result<EmailDispatch, Error> {
        let email = normalize_email(email)?;

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                info!("password reset requested for unknown email");
                return Ok(EmailDispatch::Sent);
            }
        };

        let token = EphemeralTokens::issue(
            self.store.as_ref(),
            user.id,
            TokenPurpose::PasswordReset,
        )
        .await?;

        let sent = self
            .mailer
            .send_password_reset_email(&user.email, &token, user.display_name.as_deref())
            .await;
        Ok(match sent {
            Ok(()) => EmailDispatch::Sent,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "password reset email failed");
                EmailDispatch::Failed
            }
        })
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<EmailDispatch, Error> {
        let user_id =
            EphemeralTokens::validate(self.store.as_ref(), token, TokenPurpose::PasswordReset)
                .await?;
        self.policy.check(new_password)?;

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(Error::Storage(StorageError::NotFound))?;

        let password_hash = credentials::hash_password(new_password)?;
        // The password change lands before the token is consumed; a crash
        // in between leaves the token replayable until it expires.
        self.store.update_user_password(user.id, &password_hash).await?;
        EphemeralTokens::consume(self.store.as_ref(), token).await?;
        info!(user_id = %user.id, "password reset completed");

        let sent = self
            .mailer
            .send_password_changed_email(&user.email, user.display_name.as_deref())
            .await;
        Ok(match sent {
            Ok(()) => EmailDispatch::Sent,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "password changed notice failed");
                EmailDispatch::Failed
            }
        })
    }

    pub async fn request_email_verification(&self, user_id: Uuid) -> Result<EmailDispatch, Error> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(Error::Storage(StorageError::NotFound))?;

        Ok(self.dispatch_verification(&user).await)
    }

    pub async fn verify_email(&self, token: &str) -> Result<(), Error> {
        let user_id =
            EphemeralTokens::validate(self.store.as_ref(), token, TokenPurpose::EmailVerification)
                .await?;

        self.store.set_email_verified(user_id).await?;
        EphemeralTokens::consume(self.store.as_ref(), token).await?;
        info!(user_id = %user_id, "email verified");
        Ok(())
    }

    /// Clearing cookie for logout.
    pub fn logout(&self) -> Cookie<'static> {
        self.sessions.clear_cookie()
    }

    async fn dispatch_verification(&self, user: &User) -> EmailDispatch {
        let token = match EphemeralTokens::issue(
            self.store.as_ref(),
            user.id,
            TokenPurpose::EmailVerification,
        )
        .await
        {
            Ok(token) => token,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "could not issue verification token");
                return EmailDispatch::Failed;
            }
        };

        match self
            .mailer
            .send_email_verification_email(&user.email, &token, user.display_name.as_deref())
            .await
        {
            Ok(()) => EmailDispatch::Sent,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "verification email failed");
                EmailDispatch::Failed
            }
        }
    }
}

/// Lowercases and trims the email, then checks its shape. Lookups are
/// case-insensitive because the stored form is always the normalized one.
pub fn normalize_email(raw: &str) -> Result<String, Error> {
    let email = raw.trim().to_lowercase();

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(Error::invalid_input("A valid email address is required"));
    }

    Ok(email)
}
