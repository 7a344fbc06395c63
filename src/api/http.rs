use rand::Rng;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::types::ErrorBody;
use crate::error::BackendError;

/// Retry schedule for idempotent REST reads: 3 retries with exponential backoff from 250ms, plus jitter.
const RETRY_BASE_DELAY_MS: u64 = 250;
const MAX_RETRIES: usize = 3;
const RETRY_JITTER_DIVISOR: u128 = 4; // + up to 25% jitter

fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retriable_send_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn retry_base_delay(attempt: usize) -> Duration {
    let multiplier = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(multiplier))
}

fn add_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = delay.as_millis() / RETRY_JITTER_DIVISOR;
    if max_jitter_ms == 0 {
        return delay;
    }

    let max_jitter_ms = std::cmp::min(max_jitter_ms, u128::from(u64::MAX)) as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter_ms)
}

/// Send a request, retrying transient failures.
///
/// Only used for reads; writes and auth calls go out exactly once.
pub(super) async fn send_with_retry(
    mut make_request: impl FnMut() -> RequestBuilder,
) -> Result<reqwest::Response, BackendError> {
    let max_attempts = MAX_RETRIES + 1;
    let mut attempt = 0;

    loop {
        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || !is_retriable_status(status) || attempt >= MAX_RETRIES {
                    return Ok(response);
                }

                let base_delay = retry_base_delay(attempt);
                let delay = add_jitter(base_delay);
                debug!(
                    "REST request failed with status {}; retrying in {:?} (base {:?}, attempt {}/{})",
                    status,
                    delay,
                    base_delay,
                    attempt + 1,
                    max_attempts
                );
                let _ = response.bytes().await;
                sleep(delay).await;
            }
            Err(err) => {
                if !is_retriable_send_error(&err) || attempt >= MAX_RETRIES {
                    return Err(BackendError::Connection(format!(
                        "request failed after {} attempt(s): {}",
                        attempt + 1,
                        err
                    )));
                }

                let base_delay = retry_base_delay(attempt);
                let delay = add_jitter(base_delay);
                debug!(
                    "REST request error: {}; retrying in {:?} (base {:?}, attempt {}/{})",
                    err,
                    delay,
                    base_delay,
                    attempt + 1,
                    max_attempts
                );
                sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

/// Shared HTTP plumbing for the auth and REST endpoints of one project.
#[derive(Clone)]
pub(super) struct RestTransport {
    client: Client,
    base_url: Url,
    api_key: String,
    user_agent: String,
}

impl RestTransport {
    pub fn new(
        mut base_url: Url,
        api_key: String,
        user_agent: String,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            user_agent,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| BackendError::Other(format!("Failed to build URL for {}: {}", path, e)))
    }

    /// Start a request carrying the project key and, if given, a user token.
    ///
    /// Without a user token the anon key doubles as the bearer token.
    pub fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let bearer = bearer.unwrap_or(&self.api_key);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("User-Agent", &self.user_agent)
            .header("x-request-id", Uuid::new_v4().to_string())
    }
}

/// Turn a non-success response into a `BackendError::Status`.
pub(super) async fn status_error(response: reqwest::Response) -> BackendError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    BackendError::Status {
        status,
        message: ErrorBody::message_from(&body),
    }
}
