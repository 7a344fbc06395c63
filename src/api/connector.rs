//! Seam between the initialization guard and the backend SDK.
//!
//! The guard only needs two things from a backend: a way to connect with a
//! set of credentials, and a few read-only views of the connected client.

use std::future::Future;

use tokio::sync::broadcast;
use tracing::debug;

use super::client::{ClientOptions, SupabaseClient};
use super::types::AuthStateChange;
use crate::config::{redact_url, Credentials};
use crate::error::BackendError;

/// Read-only view of a connected backend client used by the accessors.
pub trait BackendClient: Send + Sync {
    fn current_user_id(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.current_user_id().is_some()
    }

    fn auth_state_changes(&self) -> broadcast::Receiver<AuthStateChange>;
}

/// Creates a backend client; the one external call the retry wrapper guards.
pub trait BackendConnector: Send + Sync {
    type Client: BackendClient + 'static;

    fn connect(
        &self,
        credentials: &Credentials,
        options: &ClientOptions,
    ) -> impl Future<Output = Result<Self::Client, BackendError>> + Send;
}

/// Connects a [`SupabaseClient`] and probes its health endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupabaseConnector;

impl BackendConnector for SupabaseConnector {
    type Client = SupabaseClient;

    async fn connect(
        &self,
        credentials: &Credentials,
        options: &ClientOptions,
    ) -> Result<SupabaseClient, BackendError> {
        let client = SupabaseClient::new(credentials, options)?;
        if options.health_check {
            client.health_check().await?;
            debug!("Supabase health check passed for {}", redact_url(&credentials.url));
        }
        Ok(client)
    }
}

impl BackendClient for SupabaseClient {
    fn current_user_id(&self) -> Option<String> {
        self.auth().current_user().map(|u| u.id)
    }

    fn auth_state_changes(&self) -> broadcast::Receiver<AuthStateChange> {
        self.auth().on_auth_state_change()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_server::StubServer;

    #[tokio::test]
    async fn test_connect_without_health_check() {
        let options = ClientOptions {
            health_check: false,
            ..ClientOptions::default()
        };
        let client = SupabaseConnector
            .connect(&Credentials::new("https://x.supabase.co", "anon"), &options)
            .await
            .unwrap();

        assert!(!client.is_authenticated());
        assert!(client.current_user_id().is_none());
    }

    #[tokio::test]
    async fn test_connect_unreachable_host_fails() {
        let options = ClientOptions {
            timeout: std::time::Duration::from_millis(500),
            ..ClientOptions::default()
        };
        // Port 9 (discard) on localhost is not an HTTP server.
        let result = SupabaseConnector
            .connect(&Credentials::new("http://127.0.0.1:9", "anon"), &options)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_fails_when_health_check_fails() {
        let server = StubServer::start(vec![(503, r#"{"msg":"auth server starting"}"#)]).await;

        let err = SupabaseConnector
            .connect(&Credentials::new(server.url.as_str(), "anon"), &ClientOptions::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            BackendError::Status {
                status: 503,
                message: "auth server starting".to_string(),
            }
        );
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_connect_succeeds_when_healthy() {
        let server = StubServer::start(vec![(200, r#"{"name":"GoTrue"}"#)]).await;

        let client = SupabaseConnector
            .connect(&Credentials::new(server.url.as_str(), "anon"), &ClientOptions::default())
            .await
            .unwrap();

        assert!(!client.is_authenticated());
        assert!(server.requests()[0].starts_with("GET /auth/v1/health"));
    }
}
