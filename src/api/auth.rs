//! Password auth against the Supabase auth server (GoTrue).
//!
//! Holds the current session in memory and publishes every transition on a
//! broadcast channel.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::Stream;
use reqwest::Method;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::http::{status_error, RestTransport};
use super::types::{
    AuthChangeEvent, AuthResponse, AuthStateChange, PasswordGrantRequest, RefreshTokenRequest,
    Session, TokenResponse, User,
};
use crate::error::{AuthError, BackendError};

/// Buffered auth events per subscriber before it starts lagging
const AUTH_EVENT_CAPACITY: usize = 16;

/// Auth half of the Supabase client.
#[derive(Clone)]
pub struct AuthClient {
    transport: RestTransport,
    session: Arc<RwLock<Option<Session>>>,
    events: broadcast::Sender<AuthStateChange>,
}

impl AuthClient {
    pub(super) fn new(transport: RestTransport) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            transport,
            session: Arc::new(RwLock::new(None)),
            events,
        }
    }

    fn read_session(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.session.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.session.write().unwrap_or_else(|e| e.into_inner())
    }

    fn set_session(&self, session: Option<Session>, event: AuthChangeEvent) {
        *self.write_session() = session.clone();
        // No subscribers is fine.
        let _ = self.events.send(AuthStateChange { event, session });
        debug!("Auth state changed: {:?}", event);
    }

    pub fn current_session(&self) -> Option<Session> {
        self.read_session().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.read_session().as_ref().map(|s| s.user.clone())
    }

    /// Access token of the current session, for authenticated REST calls
    pub(super) fn access_token(&self) -> Option<String> {
        self.read_session().as_ref().map(|s| s.access_token.clone())
    }

    /// Adopt a previously persisted session.
    pub fn restore_session(&self, session: Session) {
        if session.is_expired() {
            debug!("Restoring an expired session; refresh before use");
        }
        self.set_session(Some(session), AuthChangeEvent::InitialSession);
    }

    /// Forget the local session without calling the server.
    pub fn clear_session(&self) {
        if self.read_session().is_some() {
            self.set_session(None, AuthChangeEvent::SignedOut);
        }
    }

    /// Subscribe to auth state transitions.
    pub fn on_auth_state_change(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    /// Auth state transitions as a stream; lagged events are skipped.
    pub fn auth_state_stream(&self) -> impl Stream<Item = AuthStateChange> + Send + 'static {
        futures_util::stream::unfold(self.events.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(change) => return Some((change, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Auth state stream lagged, skipped {} event(s)", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, AuthError> {
        let mut url = self.transport.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .transport
            .request(Method::POST, url, None)
            .json(&PasswordGrantRequest { email, password })
            .send()
            .await
            .map_err(BackendError::from)?;

        let session = Self::read_token_response(response).await?;
        info!("Signed in as user {}", session.user.id);

        let user = session.user.clone();
        self.set_session(Some(session.clone()), AuthChangeEvent::SignedIn);
        Ok(AuthResponse { user, session })
    }

    /// Exchange the current refresh token for a new session.
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let refresh_token = self
            .read_session()
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(AuthError::NoSession)?;

        let mut url = self.transport.endpoint("auth/v1/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let response = self
            .transport
            .request(Method::POST, url, None)
            .json(&RefreshTokenRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(BackendError::from)?;

        let session = match Self::read_token_response(response).await {
            Ok(session) => session,
            Err(e @ AuthError::Api { .. }) => {
                warn!("Refresh token rejected, clearing session: {}", e);
                self.clear_session();
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.set_session(Some(session.clone()), AuthChangeEvent::TokenRefreshed);
        Ok(session)
    }

    /// Revoke the session on the server and forget it locally.
    ///
    /// The local session is cleared even when the server call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(access_token) = self.access_token() else {
            debug!("sign_out called without a session");
            return Ok(());
        };

        let remote = self.revoke(&access_token).await;

        self.set_session(None, AuthChangeEvent::SignedOut);

        match remote {
            Ok(()) => {
                info!("Signed out");
                Ok(())
            }
            Err(e) => {
                warn!("Server-side sign out failed: {}", e);
                Err(AuthError::Backend(e))
            }
        }
    }

    async fn revoke(&self, access_token: &str) -> Result<(), BackendError> {
        let url = self.transport.endpoint("auth/v1/logout")?;
        let response = self
            .transport
            .request(Method::POST, url, Some(access_token))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }

    async fn read_token_response(response: reqwest::Response) -> Result<Session, AuthError> {
        let status = response.status();
        if status.is_client_error() {
            return match status_error(response).await {
                BackendError::Status { status, message } => Err(AuthError::Api { status, message }),
                other => Err(AuthError::Backend(other)),
            };
        }
        if !status.is_success() {
            return Err(AuthError::Backend(status_error(response).await));
        }

        let token: TokenResponse = response.json().await.map_err(BackendError::from)?;
        Ok(token.into_session())
    }
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("base_url", &self.transport.base_url().as_str())
            .field("signed_in", &self.read_session().is_some())
            .finish()
    }
}
