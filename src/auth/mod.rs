//! Identity and access components.
//!
//! Credential verification, session tokens and cookies, login
//! throttling, route access policy, and single-use ephemeral tokens.
//! `AuthService` composes them into the interface the rest of the
//! application calls.

pub mod credentials;
pub mod ephemeral;
pub mod guard;
pub mod service;
pub mod session;
pub mod throttle;
pub mod token;

pub use credentials::{PasswordPolicy, CharClass};
pub use ephemeral::EphemeralTokens;
pub use guard::{AccessDecision, CallerKind, RouteClass, RouteTable};
pub use service::{AccessOutcome, AuthService, LoginInput, LoginOutcome, RegisterInput};
pub use session::{SessionManager, SessionState, SESSION_COOKIE};
pub use throttle::{LoginThrottle, ThrottleConfig};
pub use token::{Claims, Identity, InvalidToken, TokenCodec};
