//! Persistence layer for the auth core.
//!
//! The core consumes storage through the `AuthStore` trait; the Postgres
//! implementation is provided for the application, the in-memory one for
//! tests and local development.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use models::{EphemeralToken, Role, TokenPurpose, User};
pub use postgres::PgStore;
pub use store::AuthStore;
