use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::credentials::{Credentials, ANON_KEY_VAR, URL_VAR};

/// Default location of the local credentials file
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Where a set of credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    BuildTime,
    EnvFile,
    ProcessEnv,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::BuildTime => write!(f, "build-time constants"),
            CredentialSource::EnvFile => write!(f, "env file"),
            CredentialSource::ProcessEnv => write!(f, "process environment"),
        }
    }
}

/// A single source of credentials.
///
/// `load` returns `Some` only when both the URL and the key are present.
pub trait CredentialProvider: Send + Sync {
    fn source(&self) -> CredentialSource;

    fn load(&self) -> Option<Credentials>;
}

/// Values baked into the binary at compile time.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildTimeProvider {
    url: Option<&'static str>,
    key: Option<&'static str>,
}

impl BuildTimeProvider {
    pub fn new(url: Option<&'static str>, key: Option<&'static str>) -> Self {
        Self { url, key }
    }

    /// Read `SUPABASE_URL` / `SUPABASE_ANON_KEY` from the build environment.
    pub fn from_compile_env() -> Self {
        Self::new(option_env!("SUPABASE_URL"), option_env!("SUPABASE_ANON_KEY"))
    }
}

impl CredentialProvider for BuildTimeProvider {
    fn source(&self) -> CredentialSource {
        CredentialSource::BuildTime
    }

    fn load(&self) -> Option<Credentials> {
        Credentials::from_parts(
            self.url.map(str::to_string),
            self.key.map(str::to_string),
        )
    }
}

/// A dotenv-style `KEY=VALUE` file.
///
/// The file is parsed without touching the process environment.
#[derive(Debug, Clone)]
pub struct EnvFileProvider {
    path: PathBuf,
}

impl EnvFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for EnvFileProvider {
    fn source(&self) -> CredentialSource {
        CredentialSource::EnvFile
    }

    fn load(&self) -> Option<Credentials> {
        if !self.path.exists() {
            debug!("Env file {:?} not found", self.path);
            return None;
        }

        let entries = match dotenvy::from_path_iter(&self.path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to open env file {:?}: {}", self.path, e);
                return None;
            }
        };

        let mut url = None;
        let mut key = None;
        for entry in entries {
            match entry {
                Ok((name, value)) if name == URL_VAR => url = Some(value),
                Ok((name, value)) if name == ANON_KEY_VAR => key = Some(value),
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to parse env file {:?}: {}", self.path, e);
                    return None;
                }
            }
        }

        Credentials::from_parts(url, key)
    }
}

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Process environment variables.
pub struct ProcessEnvProvider {
    lookup: Box<EnvLookup>,
}

impl ProcessEnvProvider {
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Use a custom variable lookup instead of `std::env::var`.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

impl Default for ProcessEnvProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessEnvProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessEnvProvider").finish_non_exhaustive()
    }
}

impl CredentialProvider for ProcessEnvProvider {
    fn source(&self) -> CredentialSource {
        CredentialSource::ProcessEnv
    }

    fn load(&self) -> Option<Credentials> {
        // Either one missing means no credentials at all.
        Credentials::from_parts((self.lookup)(URL_VAR), (self.lookup)(ANON_KEY_VAR))
    }
}
