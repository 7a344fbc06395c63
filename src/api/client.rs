use reqwest::Method;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::auth::AuthClient;
use super::http::{send_with_retry, status_error, RestTransport};
use crate::config::Credentials;
use crate::error::BackendError;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default client version (from Cargo.toml)
const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options handed to the backend client at initialization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub user_agent: String,
    /// Probe the auth health endpoint before reporting the client ready
    pub health_check: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("khilonjiya/{}", DEFAULT_VERSION),
            health_check: true,
        }
    }
}

/// Supabase client for one project.
///
/// Cloning is cheap; clones share the HTTP connection pool and auth session.
#[derive(Clone)]
pub struct SupabaseClient {
    transport: RestTransport,
    auth: AuthClient,
}

impl SupabaseClient {
    pub fn new(credentials: &Credentials, options: &ClientOptions) -> Result<Self, BackendError> {
        let base_url = Url::parse(&credentials.url)
            .map_err(|e| BackendError::Other(format!("Invalid base URL: {}", e)))?;
        let transport = RestTransport::new(
            base_url,
            credentials.key.clone(),
            options.user_agent.clone(),
            options.timeout,
        )?;
        let auth = AuthClient::new(transport.clone());

        Ok(Self { transport, auth })
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn base_url(&self) -> &Url {
        self.transport.base_url()
    }

    /// Check that the auth server answers for this project and key.
    pub async fn health_check(&self) -> Result<(), BackendError> {
        let url = self.transport.endpoint("auth/v1/health")?;
        debug!("Health check: {}", url);

        let response = self.transport.request(Method::GET, url, None).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }

    /// Start a query against a table exposed through the REST API.
    pub fn from(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table)
    }
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url().as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Read query against `/rest/v1/{table}`.
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    client: &'a SupabaseClient,
    table: String,
    columns: String,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<usize>,
}

impl<'a> QueryBuilder<'a> {
    fn new(client: &'a SupabaseClient, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order = Some(format!("{}.{}", column, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn build_url(&self) -> Result<Url, BackendError> {
        let mut url = self
            .client
            .transport
            .endpoint(&format!("rest/v1/{}", self.table))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", &self.columns);
            for (column, filter) in &self.filters {
                pairs.append_pair(column, filter);
            }
            if let Some(order) = &self.order {
                pairs.append_pair("order", order);
            }
            if let Some(limit) = self.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        Ok(url)
    }

    /// Run the query, authenticated as the signed-in user when there is one.
    pub async fn execute(self) -> Result<Vec<serde_json::Value>, BackendError> {
        let url = self.build_url()?;
        let access_token = self.client.auth.access_token();
        debug!("REST query: {}", url);

        let response = send_with_retry(|| {
            self.client
                .transport
                .request(Method::GET, url.clone(), access_token.as_deref())
        })
        .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}
