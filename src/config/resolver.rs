use std::fmt;
use std::path::PathBuf;

use tracing::{debug, error, info};
use url::Url;

use super::credentials::{mask_key, redact_url, Credentials};
use super::providers::{
    BuildTimeProvider, CredentialProvider, CredentialSource, EnvFileProvider, ProcessEnvProvider,
};
use crate::error::ConfigError;

/// Validated credentials and the provider that produced them.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub credentials: Credentials,
    pub source: CredentialSource,
    pub url: Url,
}

/// Ordered list of credential providers.
pub struct CredentialResolver {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialResolver {
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    /// Build-time constants, then `env_file`, then the process environment.
    pub fn with_defaults(env_file: impl Into<PathBuf>) -> Self {
        Self::new(vec![
            Box::new(BuildTimeProvider::from_compile_env()),
            Box::new(EnvFileProvider::new(env_file)),
            Box::new(ProcessEnvProvider::new()),
        ])
    }

    /// Append a provider with the lowest priority so far.
    pub fn with_provider(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn sources(&self) -> Vec<CredentialSource> {
        self.providers.iter().map(|p| p.source()).collect()
    }

    /// Resolve credentials from the first provider that has both fields.
    ///
    /// Only the winning value is validated; an invalid URL from a
    /// higher-priority source is an error, not a reason to keep looking.
    pub fn resolve(&self) -> Result<ResolvedCredentials, ConfigError> {
        for provider in &self.providers {
            let source = provider.source();
            let Some(credentials) = provider.load() else {
                debug!("No Supabase credentials from {}", source);
                continue;
            };

            let url = credentials.validate().map_err(|e| {
                error!(
                    "Supabase credentials from {} are invalid: {} (url: {}, key: {})",
                    source,
                    e,
                    redact_url(&credentials.url),
                    mask_key(&credentials.key)
                );
                e
            })?;

            info!(
                "Using Supabase credentials from {} (url: {}, key: {})",
                source,
                redact_url(&credentials.url),
                mask_key(&credentials.key)
            );

            return Ok(ResolvedCredentials {
                credentials,
                source,
                url,
            });
        }

        let checked = self
            .sources()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        error!("No Supabase credentials found (checked: {})", checked);
        Err(ConfigError::Missing { checked })
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("sources", &self.sources())
            .finish()
    }
}
