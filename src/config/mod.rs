//! Supabase credential resolution.
//!
//! Credentials come from an ordered list of providers:
//! 1. Build-time constants (`SUPABASE_URL` / `SUPABASE_ANON_KEY` baked in by `option_env!`)
//! 2. A local dotenv-style file (defaults to `.env`)
//! 3. The process environment
//!
//! The first provider that yields both a URL and a key wins; later providers
//! are never consulted.

mod credentials;
mod providers;
mod resolver;

pub use credentials::{mask_key, redact_url, validate_url, Credentials, ANON_KEY_VAR, URL_VAR};
pub use providers::{
    BuildTimeProvider, CredentialProvider, CredentialSource, EnvFileProvider, ProcessEnvProvider,
    DEFAULT_ENV_FILE,
};
pub use resolver::{CredentialResolver, ResolvedCredentials};
