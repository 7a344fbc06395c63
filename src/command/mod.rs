mod check;
mod login;
mod logout;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use khilonjiya::api::SupabaseConnector;
use khilonjiya::config::CredentialResolver;
use khilonjiya::session::SessionStore;
use khilonjiya::startup::{RetryPolicy, SupabaseService, DEFAULT_DELAY_UNIT};

use crate::cli::Cli;

pub use check::run_check;
pub use login::run_login;
pub use logout::run_logout;
pub use status::run_status;

/// Settings shared by every subcommand.
pub struct AppContext {
    pub env_file: PathBuf,
    pub cache_dir: Option<String>,
    pub max_attempts: u32,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            env_file: cli.env_file.clone(),
            cache_dir: cli.cache_dir.clone(),
            max_attempts: cli.max_attempts,
        }
    }

    pub fn resolver(&self) -> CredentialResolver {
        CredentialResolver::with_defaults(self.env_file.clone())
    }

    pub fn backend(&self) -> Arc<SupabaseService<SupabaseConnector>> {
        let retry = RetryPolicy::new(self.max_attempts, DEFAULT_DELAY_UNIT);
        Arc::new(SupabaseService::new(SupabaseConnector, self.resolver()).with_retry_policy(retry))
    }

    pub fn session_store(&self) -> Result<SessionStore> {
        SessionStore::new(self.cache_dir.as_deref())
    }
}
