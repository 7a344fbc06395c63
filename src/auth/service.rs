use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use super::validation::{validate_email, validate_password};
use crate::api::{AuthResponse, BackendConnector, SupabaseClient};
use crate::error::{AuthError, Error, Result};
use crate::startup::SupabaseService;

/// Shown for any login failure that is not a typed auth error
pub const GENERIC_LOGIN_FAILURE: &str = "Login failed. Please try again.";

/// Email/password sign-in on a connected backend client.
pub trait PasswordAuth: Send + Sync {
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = std::result::Result<AuthResponse, AuthError>> + Send;

    fn sign_out(&self) -> impl Future<Output = std::result::Result<(), AuthError>> + Send;
}

impl PasswordAuth for SupabaseClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<AuthResponse, AuthError> {
        self.auth().sign_in_with_password(email, password).await
    }

    async fn sign_out(&self) -> std::result::Result<(), AuthError> {
        self.auth().sign_out().await
    }
}

/// Auth operations the login screen calls.
pub struct AuthService<C: BackendConnector> {
    backend: Arc<SupabaseService<C>>,
}

impl<C> AuthService<C>
where
    C: BackendConnector,
    C::Client: PasswordAuth,
{
    pub fn new(backend: Arc<SupabaseService<C>>) -> Self {
        Self { backend }
    }

    /// Validate the form, then sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse> {
        validate_email(email).map_err(AuthError::InvalidInput)?;
        validate_password(password).map_err(AuthError::InvalidInput)?;

        let client = self.backend.client()?;
        let response = client
            .sign_in_with_password(email.trim(), password)
            .await
            .map_err(|e| {
                warn!("Sign in failed: {}", e);
                Error::Auth(e)
            })?;

        info!("User {} signed in", response.user.id);
        Ok(response)
    }

    pub async fn sign_out(&self) -> Result<()> {
        let client = self.backend.client()?;
        client.sign_out().await?;
        Ok(())
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.backend.current_user_id()
    }

    pub fn is_authenticated(&self) -> bool {
        self.backend.is_authenticated()
    }
}

/// Message the login screen shows for a failed sign-in.
///
/// Typed auth errors carry a message meant for the user and are shown as
/// is; everything else collapses to a generic message.
pub fn login_failure_message(err: &Error) -> String {
    match err {
        Error::Auth(AuthError::Api { message, .. }) | Error::Auth(AuthError::InvalidInput(message)) => {
            message.clone()
        }
        _ => GENERIC_LOGIN_FAILURE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AuthStateChange, BackendClient, ClientOptions, Session, User};
    use crate::config::{BuildTimeProvider, CredentialResolver, Credentials};
    use crate::error::BackendError;
    use chrono::Utc;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    struct FakeAuthClient {
        password: &'static str,
        signed_in: Mutex<Option<String>>,
        events: broadcast::Sender<AuthStateChange>,
    }

    impl BackendClient for FakeAuthClient {
        fn current_user_id(&self) -> Option<String> {
            self.signed_in.lock().unwrap().clone()
        }

        fn auth_state_changes(&self) -> broadcast::Receiver<AuthStateChange> {
            self.events.subscribe()
        }
    }

    impl PasswordAuth for FakeAuthClient {
        async fn sign_in_with_password(
            &self,
            email: &str,
            password: &str,
        ) -> std::result::Result<AuthResponse, AuthError> {
            if password != self.password {
                return Err(AuthError::Api {
                    status: 400,
                    message: "Invalid login credentials".to_string(),
                });
            }
            let user = User {
                id: format!("id-{}", email),
                email: Some(email.to_string()),
                phone: None,
                role: None,
                created_at: None,
            };
            *self.signed_in.lock().unwrap() = Some(user.id.clone());
            Ok(AuthResponse {
                user: user.clone(),
                session: Session {
                    access_token: "at".to_string(),
                    refresh_token: "rt".to_string(),
                    expires_at: Utc::now(),
                    user,
                },
            })
        }

        async fn sign_out(&self) -> std::result::Result<(), AuthError> {
            *self.signed_in.lock().unwrap() = None;
            Ok(())
        }
    }

    struct FakeConnector;

    impl BackendConnector for FakeConnector {
        type Client = FakeAuthClient;

        async fn connect(
            &self,
            _credentials: &Credentials,
            _options: &ClientOptions,
        ) -> std::result::Result<FakeAuthClient, BackendError> {
            let (events, _) = broadcast::channel(4);
            Ok(FakeAuthClient {
                password: "hunter22",
                signed_in: Mutex::new(None),
                events,
            })
        }
    }

    fn backend() -> Arc<SupabaseService<FakeConnector>> {
        let resolver = CredentialResolver::new(vec![Box::new(BuildTimeProvider::new(
            Some("https://x.supabase.co"),
            Some("anon-key"),
        ))]);
        Arc::new(SupabaseService::new(FakeConnector, resolver))
    }

    #[tokio::test]
    async fn test_sign_in_before_initialize() {
        let auth = AuthService::new(backend());
        let err = auth
            .sign_in("buyer@khilonjiya.com", "hunter22")
            .await
            .unwrap_err();
        assert_eq!(err, Error::NotInitialized);
        assert_eq!(login_failure_message(&err), GENERIC_LOGIN_FAILURE);
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let backend = backend();
        backend.initialize().await.unwrap();
        let auth = AuthService::new(backend);

        let response = auth
            .sign_in(" buyer@khilonjiya.com ", "hunter22")
            .await
            .unwrap();
        assert_eq!(response.user.id, "id-buyer@khilonjiya.com");
        assert!(auth.is_authenticated());
        assert_eq!(
            auth.current_user_id().as_deref(),
            Some("id-buyer@khilonjiya.com")
        );

        auth.sign_out().await.unwrap();
        assert!(auth.current_user_id().is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_message_shown_verbatim() {
        let backend = backend();
        backend.initialize().await.unwrap();
        let auth = AuthService::new(backend);

        let err = auth
            .sign_in("buyer@khilonjiya.com", "wrong-password")
            .await
            .unwrap_err();
        assert_eq!(login_failure_message(&err), "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_invalid_form_rejected_before_backend() {
        let auth = AuthService::new(backend());
        let err = auth.sign_in("not-an-email", "hunter22").await.unwrap_err();
        assert_eq!(login_failure_message(&err), "Please enter a valid email");
    }

    #[test]
    fn test_non_auth_errors_get_generic_message() {
        let err = Error::Initialization {
            attempts: 3,
            source: BackendError::Connection("refused".to_string()),
        };
        assert_eq!(login_failure_message(&err), GENERIC_LOGIN_FAILURE);

        let err = Error::Auth(AuthError::Backend(BackendError::Status {
            status: 500,
            message: "boom".to_string(),
        }));
        assert_eq!(login_failure_message(&err), GENERIC_LOGIN_FAILURE);
    }
}
