//! Session storage for signed-in users.
//!
//! Persists the auth session between CLI invocations in
//! `~/.khilonjiya/session.json` (or a custom cache directory).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::api::Session;

/// File name of the persisted session
const SESSION_FILE: &str = "session.json";

/// Resolve the cache directory, defaulting to `~/.khilonjiya`.
pub fn resolve_cache_dir(cache_dir: Option<&str>) -> Result<PathBuf> {
    match cache_dir {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Ok(dirs::home_dir()
            .context("Could not determine home directory")?
            .join(".khilonjiya")),
    }
}

/// Session store backed by a JSON file.
pub struct SessionStore {
    session_path: PathBuf,
}

impl SessionStore {
    /// Create a new session store
    ///
    /// # Arguments
    /// * `cache_dir` - Optional custom cache directory. Defaults to ~/.khilonjiya
    pub fn new(cache_dir: Option<&str>) -> Result<Self> {
        let base_dir = resolve_cache_dir(cache_dir)?;

        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", base_dir))?;

        Ok(Self {
            session_path: base_dir.join(SESSION_FILE),
        })
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.get_session(), Ok(Some(_)))
    }

    fn parse_session(raw: &str) -> Option<Session> {
        match serde_json::from_str::<Session>(raw) {
            Ok(session) => {
                if session.access_token.is_empty()
                    || session.refresh_token.is_empty()
                    || session.user.id.is_empty()
                {
                    warn!("Session validation failed: missing or invalid required fields");
                    return None;
                }
                Some(session)
            }
            Err(e) => {
                warn!("Failed to parse session JSON: {}", e);
                None
            }
        }
    }

    /// Load the stored session.
    ///
    /// An unparseable file is removed and reported as no session.
    pub fn get_session(&self) -> Result<Option<Session>> {
        if !self.session_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.session_path)
            .with_context(|| format!("Failed to read session file: {:?}", self.session_path))?;

        if let Some(session) = Self::parse_session(&content) {
            return Ok(Some(session));
        }

        warn!("Invalid session data found, removing session file");
        let _ = self.remove_session();
        Ok(None)
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        let content =
            serde_json::to_string_pretty(session).context("Failed to serialize session data")?;

        std::fs::write(&self.session_path, content)
            .with_context(|| format!("Failed to write session file: {:?}", self.session_path))?;

        info!("Session saved for user {}", session.user.id);
        debug!("Session saved to {:?}", self.session_path);

        Ok(())
    }

    pub fn remove_session(&self) -> Result<()> {
        if self.session_path.exists() {
            std::fs::remove_file(&self.session_path).with_context(|| {
                format!("Failed to remove session file: {:?}", self.session_path)
            })?;
            info!("Session removed");
        }

        Ok(())
    }
}
