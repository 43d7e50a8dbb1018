use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // One message for unknown email and wrong password, so responses
    // cannot be used to enumerate registered accounts.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is blocked")]
    AccountBlocked,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Too many login attempts, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Token error: {0}")]
    TokenLifecycle(#[from] TokenLifecycleError),

    #[error("Invalid input: {}", violations.join("; "))]
    InvalidInput { violations: Vec<String> },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // Server-side faults (e.g. a token that fails to encode); never a
    // user or authentication error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(violation: impl Into<String>) -> Self {
        Error::InvalidInput { violations: vec![violation.into()] }
    }

    /// Machine-readable code for API-style callers.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Configuration(ConfigurationError::Auth { .. }) => "configuration-error-auth",
            Error::Configuration(ConfigurationError::Storage { .. }) => {
                "configuration-error-storage"
            }
            Error::InvalidCredentials => "invalid-credentials",
            Error::AccountBlocked => "account-blocked",
            Error::Unauthenticated => "unauthenticated",
            Error::Forbidden => "forbidden",
            Error::RateLimited { .. } => "rate-limited",
            Error::TokenLifecycle(TokenLifecycleError::NotFound) => "token-not-found",
            Error::TokenLifecycle(TokenLifecycleError::Expired) => "token-expired",
            Error::TokenLifecycle(TokenLifecycleError::AlreadyUsed) => "token-already-used",
            Error::InvalidInput { .. } => "invalid-input",
            Error::Storage(_) => "storage-error",
            Error::Internal(_) => "internal-error",
        }
    }
}

/// Deployment defects. The two kinds stay distinct so operators can tell
/// a missing signing secret from an unreachable database.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Auth configuration error: missing or invalid setting '{setting}'")]
    Auth { setting: String },

    #[error("Storage configuration error: missing or invalid setting '{setting}'")]
    Storage { setting: String },
}

/// Failure causes for ephemeral (password-reset / email-verification)
/// tokens. These are opaque random values, not forgeable structures, so
/// reporting the precise cause leaks nothing an attacker could use.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenLifecycleError {
    #[error("Token not found")]
    NotFound,

    #[error("Token has expired")]
    Expired,

    #[error("Token has already been used")]
    AlreadyUsed,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::Storage(StorageError::NotFound),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Error::Storage(StorageError::ConnectionError(err.to_string()))
            }
            _ => Error::Storage(StorageError::QueryError(err.to_string())),
        }
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(err: bcrypt::BcryptError) -> Self {
        // A hash that cannot be computed or parsed is a stored-data
        // problem, never a user error.
        Error::Storage(StorageError::QueryError(err.to_string()))
    }
}

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "code": self.code(),
                "message": self.to_string()
            }
        });

        let mut builder = HttpResponse::build(status);
        if let Error::RateLimited { retry_after_secs } = self {
            builder.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        builder.json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::AccountBlocked => StatusCode::FORBIDDEN,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::TokenLifecycle(TokenLifecycleError::Expired) => StatusCode::GONE,
            Error::TokenLifecycle(_) => StatusCode::BAD_REQUEST,
            Error::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
