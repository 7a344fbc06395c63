//! Supabase backend bootstrap for the khilonjiya.com marketplace.
//!
//! Resolves project credentials from a prioritized list of sources, brings
//! the backend client up with bounded retries behind a single-flight guard,
//! and exposes the accessors and auth facade the app's screens use.
//!
//! ```ignore
//! let backend = Arc::new(SupabaseService::new(
//!     SupabaseConnector,
//!     CredentialResolver::with_defaults(".env"),
//! ));
//! backend.initialize().await?;
//! let auth = AuthService::new(Arc::clone(&backend));
//! auth.sign_in("buyer@khilonjiya.com", "password").await?;
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod session;
pub mod startup;

pub use error::{AuthError, BackendError, ConfigError, Error, Result};
