//! Error types for backend bootstrap.
//!
//! Every error here is `Clone`: the outcome of one initialization attempt is
//! handed to every caller that was waiting on it.

use thiserror::Error;

/// Missing or invalid Supabase credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No provider produced both a URL and a key
    #[error("No Supabase credentials found (checked: {checked})")]
    Missing { checked: String },
    /// A required field is empty
    #[error("Supabase {field} is empty")]
    EmptyField { field: &'static str },
    /// URL failed to parse, has a non-http(s) scheme, or has no host
    #[error("Invalid Supabase URL: {reason}")]
    InvalidUrl { reason: String },
}

/// Failure reported by the backend client while connecting or serving a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            BackendError::Connection(err.to_string())
        } else if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Other(err.to_string())
        }
    }
}

/// Authentication failures surfaced to the login flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Rejected by the auth server; the message is meant for the user
    #[error("{message}")]
    Api { status: u16, message: String },
    /// Form input failed local validation
    #[error("{0}")]
    InvalidInput(String),
    #[error("No active session")]
    NoSession,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Top-level error returned by the backend service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("Backend initialization failed after {attempts} attempt(s): {source}")]
    Initialization { attempts: u32, source: BackendError },
    #[error("Supabase client is not initialized; call initialize() first")]
    NotInitialized,
    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub type Result<T> = std::result::Result<T, Error>;
