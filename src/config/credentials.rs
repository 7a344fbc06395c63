use std::fmt;

use url::Url;

use crate::error::ConfigError;

/// Name of the URL entry in every credential source
pub const URL_VAR: &str = "SUPABASE_URL";

/// Name of the anon key entry in every credential source
pub const ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";

/// Keys at or below this length are masked entirely
const MASK_VISIBLE_MIN_LEN: usize = 12;

/// Backend URL and anon key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub key: String,
}

impl Credentials {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
        }
    }

    /// Build credentials only when both parts are present and non-blank.
    ///
    /// A source that has one field but not the other yields nothing.
    pub fn from_parts(url: Option<String>, key: Option<String>) -> Option<Self> {
        let url = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())?;
        let key = key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())?;
        Some(Self { url, key })
    }

    /// Check that both fields are set and the URL is an absolute http(s) URL.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyField { field: "URL" });
        }
        if self.key.trim().is_empty() {
            return Err(ConfigError::EmptyField { field: "anon key" });
        }
        validate_url(&self.url)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &redact_url(&self.url))
            .field("key", &mask_key(&self.key))
            .finish()
    }
}

/// Parse a backend URL, requiring an http or https scheme and a non-empty host.
pub fn validate_url(raw: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        reason: format!("{} (is the scheme missing?)", e),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::InvalidUrl {
                reason: format!("unsupported scheme '{}', expected http or https", other),
            })
        }
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(ConfigError::InvalidUrl {
            reason: "missing host".to_string(),
        }),
    }
}

/// Reduce a URL to `scheme://host[:port]` for logging.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
            (Some(host), None) => format!("{}://{}", url.scheme(), host),
            (None, _) => format!("{}://", url.scheme()),
        },
        Err(_) => "<invalid url>".to_string(),
    }
}

/// Mask an API key for logging, keeping only its first and last four characters.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= MASK_VISIBLE_MIN_LEN {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
