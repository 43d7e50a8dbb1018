//! Identity and access core for a multi-tenant storefront.
//!
//! Authenticates users, maintains cookie-held sessions, enforces
//! role-based access, throttles credential guessing, and manages
//! single-use tokens for password reset and email verification. The
//! surrounding application supplies persistence and email delivery
//! through the `AuthStore` and `Mailer` traits and asks this crate
//! "who is this?" and "are they allowed?".

pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod error;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
pub use config::Settings;

pub use auth::{
    AccessDecision, AuthService, CallerKind, Identity, LoginInput, RegisterInput, RouteTable,
    SessionState,
};
pub use db::{AuthStore, MemoryStore, PgStore, Role, TokenPurpose, User};
pub use email::{EmailDispatch, LogMailer, Mailer};
