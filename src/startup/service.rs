//! Single-flight initialization of the backend client.
//!
//! ```text
//! Uninitialized --initialize()--> InProgress --ok--> Ready
//!       ^                             |
//!       |                             +--retries exhausted--> Failed
//!       +--dispose() / cancelled------+          |
//!                                                +--initialize()--> InProgress
//! ```
//!
//! Callers that arrive while an attempt is in flight wait for that attempt
//! and receive its outcome; they never start a second one.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use super::retry::{retry_linear, RetryPolicy};
use crate::api::{AuthStateChange, BackendClient, BackendConnector, ClientOptions};
use crate::config::{redact_url, CredentialResolver};
use crate::error::{Error, Result};

/// Observable lifecycle of the backend client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitializationState {
    #[default]
    Uninitialized,
    InProgress,
    Ready,
    Failed,
}

impl InitializationState {
    pub fn is_ready(&self) -> bool {
        matches!(self, InitializationState::Ready)
    }
}

type Outcome = Result<()>;

enum State<T> {
    Uninitialized,
    /// Waiters clone the receiver and wait for `Some(outcome)`
    InProgress(watch::Receiver<Option<Outcome>>),
    Ready(Arc<T>),
    Failed(Error),
}

enum Role {
    Leader(watch::Sender<Option<Outcome>>),
    Waiter(watch::Receiver<Option<Outcome>>),
}

/// Resets `InProgress` to `Uninitialized` if the initializing future is
/// dropped before it records an outcome.
struct InFlightGuard<'a, T> {
    state: &'a Mutex<State<T>>,
    armed: bool,
}

impl<T> InFlightGuard<'_, T> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T> Drop for InFlightGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, State::InProgress(_)) {
            warn!("Backend initialization was cancelled before completing");
            *state = State::Uninitialized;
        }
    }
}

/// Owns the backend client and its initialization lifecycle.
///
/// Construct one at the composition root and share it (usually behind an
/// `Arc`) with everything that needs the backend.
pub struct SupabaseService<C: BackendConnector> {
    connector: C,
    resolver: CredentialResolver,
    options: ClientOptions,
    retry: RetryPolicy,
    state: Mutex<State<C::Client>>,
}

impl<C: BackendConnector> SupabaseService<C> {
    pub fn new(connector: C, resolver: CredentialResolver) -> Self {
        Self {
            connector,
            resolver,
            options: ClientOptions::default(),
            retry: RetryPolicy::default(),
            state: Mutex::new(State::Uninitialized),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn lock_state(&self) -> MutexGuard<'_, State<C::Client>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bring the backend client up.
    ///
    /// Returns immediately once ready. If another caller is already
    /// initializing, waits for that attempt and returns its result. After a
    /// failure, the next call starts a fresh attempt.
    pub async fn initialize(&self) -> Result<()> {
        loop {
            let role = {
                let mut state = self.lock_state();
                match &*state {
                    State::Ready(_) => {
                        debug!("Supabase client already initialized");
                        return Ok(());
                    }
                    State::InProgress(rx) => Role::Waiter(rx.clone()),
                    State::Uninitialized | State::Failed(_) => {
                        let (tx, rx) = watch::channel(None);
                        *state = State::InProgress(rx);
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Leader(tx) => return self.lead(tx).await,
                Role::Waiter(mut rx) => {
                    debug!("Initialization already in progress, waiting for it");
                    let outcome = match rx.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        Err(_) => None,
                    };
                    match outcome {
                        Some(outcome) => return outcome,
                        // The leader was dropped mid-flight; start over.
                        None => continue,
                    }
                }
            }
        }
    }

    async fn lead(&self, tx: watch::Sender<Option<Outcome>>) -> Result<()> {
        let guard = InFlightGuard {
            state: &self.state,
            armed: true,
        };

        let result = self.connect_with_retry().await;

        {
            let mut state = self.lock_state();
            *state = match &result {
                Ok(client) => State::Ready(Arc::clone(client)),
                Err(e) => State::Failed(e.clone()),
            };
        }
        guard.disarm();

        let outcome = result.map(|_| ());
        tx.send_replace(Some(outcome.clone()));
        outcome
    }

    async fn connect_with_retry(&self) -> Result<Arc<C::Client>> {
        info!("🔌 Initializing Supabase client...");

        let resolved = self.resolver.resolve().map_err(|e| {
            error!("❌ {}", e);
            Error::Configuration(e)
        })?;
        let credentials = &resolved.credentials;
        let max_attempts = self.retry.max_attempts;

        let result = retry_linear(&self.retry, |attempt| {
            debug!(
                "Connecting to {} (attempt {}/{})",
                redact_url(&credentials.url),
                attempt,
                max_attempts
            );
            self.connector.connect(credentials, &self.options)
        })
        .await;

        match result {
            Ok(client) => {
                info!(
                    "✅ Supabase client ready ({}, credentials from {})",
                    redact_url(&credentials.url),
                    resolved.source
                );
                Ok(Arc::new(client))
            }
            Err(exhausted) => {
                error!(
                    "❌ Supabase initialization failed after {} attempt(s): {}",
                    exhausted.attempts, exhausted.last_error
                );
                Err(Error::Initialization {
                    attempts: exhausted.attempts,
                    source: exhausted.last_error,
                })
            }
        }
    }

    /// Drop the client and return to `Uninitialized`.
    ///
    /// An attempt in flight is left alone.
    pub fn dispose(&self) {
        let mut state = self.lock_state();
        match &*state {
            State::InProgress(_) => debug!("dispose() ignored while initialization is in flight"),
            _ => {
                *state = State::Uninitialized;
                info!("Supabase client disposed");
            }
        }
    }

    pub fn state(&self) -> InitializationState {
        match &*self.lock_state() {
            State::Uninitialized => InitializationState::Uninitialized,
            State::InProgress(_) => InitializationState::InProgress,
            State::Ready(_) => InitializationState::Ready,
            State::Failed(_) => InitializationState::Failed,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state().is_ready()
    }

    /// Error from the last failed attempt, while in `Failed`.
    pub fn last_error(&self) -> Option<Error> {
        match &*self.lock_state() {
            State::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    // ========== Accessors ==========

    pub fn client(&self) -> Result<Arc<C::Client>> {
        self.try_client().ok_or(Error::NotInitialized)
    }

    /// Like [`client`](Self::client), but `None` instead of an error.
    pub fn try_client(&self) -> Option<Arc<C::Client>> {
        match &*self.lock_state() {
            State::Ready(client) => Some(Arc::clone(client)),
            _ => None,
        }
    }

    /// `false` when not ready.
    pub fn is_authenticated(&self) -> bool {
        self.try_client()
            .map(|c| c.is_authenticated())
            .unwrap_or(false)
    }

    /// `None` when not ready or nobody is signed in.
    pub fn current_user_id(&self) -> Option<String> {
        self.try_client().and_then(|c| c.current_user_id())
    }

    pub fn auth_state_changes(&self) -> Result<broadcast::Receiver<AuthStateChange>> {
        Ok(self.client()?.auth_state_changes())
    }
}

impl<C: BackendConnector> std::fmt::Debug for SupabaseService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseService")
            .field("state", &self.state())
            .field("resolver", &self.resolver)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AuthChangeEvent, Session, User};
    use crate::config::{BuildTimeProvider, Credentials};
    use crate::error::{BackendError, ConfigError};
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    struct MockClient {
        user_id: Option<String>,
        events: broadcast::Sender<AuthStateChange>,
    }

    impl BackendClient for MockClient {
        fn current_user_id(&self) -> Option<String> {
            self.user_id.clone()
        }

        fn auth_state_changes(&self) -> broadcast::Receiver<AuthStateChange> {
            self.events.subscribe()
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyConnector {
        failures: u32,
        latency: Duration,
        user_id: Option<String>,
        calls: Arc<AtomicU32>,
    }

    impl FlakyConnector {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                latency: Duration::ZERO,
                user_id: None,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn with_user(mut self, user_id: &str) -> Self {
            self.user_id = Some(user_id.to_string());
            self
        }
    }

    impl BackendConnector for FlakyConnector {
        type Client = MockClient;

        async fn connect(
            &self,
            _credentials: &Credentials,
            _options: &ClientOptions,
        ) -> std::result::Result<MockClient, BackendError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.latency.is_zero() {
                sleep(self.latency).await;
            }
            if call <= self.failures {
                return Err(BackendError::Connection(format!("call {} refused", call)));
            }
            let (events, _) = broadcast::channel(4);
            Ok(MockClient {
                user_id: self.user_id.clone(),
                events,
            })
        }
    }

    fn valid_resolver() -> CredentialResolver {
        CredentialResolver::new(vec![Box::new(BuildTimeProvider::new(
            Some("https://x.supabase.co"),
            Some("anon-key"),
        ))])
    }

    fn service(connector: FlakyConnector) -> (SupabaseService<FlakyConnector>, Arc<AtomicU32>) {
        let calls = connector.calls.clone();
        (SupabaseService::new(connector, valid_resolver()), calls)
    }

    #[tokio::test]
    async fn test_initialize_once_then_noop() {
        let (service, calls) = service(FlakyConnector::new(0));
        assert_eq!(service.state(), InitializationState::Uninitialized);

        service.initialize().await.unwrap();
        assert_eq!(service.state(), InitializationState::Ready);

        service.initialize().await.unwrap();
        service.initialize().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_after_linear_backoff() {
        let (service, calls) = service(FlakyConnector::new(u32::MAX));
        let start = Instant::now();

        let err = service.initialize().await.unwrap_err();

        match err {
            Error::Initialization { attempts, source } => {
                assert_eq!(attempts, 3);
                assert_eq!(source, BackendError::Connection("call 3 refused".to_string()));
            }
            other => panic!("expected Initialization, got {:?}", other),
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(6000) && elapsed < Duration::from_millis(6100));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(service.state(), InitializationState::Failed);
        assert!(service.last_error().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_service_can_retry_later() {
        let (service, calls) = service(FlakyConnector::new(3));

        assert!(service.initialize().await.is_err());
        assert_eq!(service.state(), InitializationState::Failed);

        service.initialize().await.unwrap();
        assert_eq!(service.state(), InitializationState::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(service.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_retry_budget() {
        let (service, calls) = service(FlakyConnector::new(2));
        let start = Instant::now();

        service.initialize().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000) && elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_attempt() {
        let connector = FlakyConnector::new(0).with_latency(Duration::from_millis(500));
        let (service, calls) = service(connector);
        let service = Arc::new(service);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.initialize().await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(service.is_initialized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_failure() {
        let connector = FlakyConnector::new(u32::MAX).with_latency(Duration::from_millis(100));
        let (service, calls) = service(connector);
        let service = Arc::new(service);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.initialize().await })
            })
            .collect();

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::Initialization { attempts: 3, .. }));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_url_is_configuration_error() {
        let connector = FlakyConnector::new(0);
        let calls = connector.calls.clone();
        let resolver = CredentialResolver::new(vec![Box::new(BuildTimeProvider::new(
            Some("not-a-url"),
            Some("abc"),
        ))]);
        let service = SupabaseService::new(connector, resolver);

        let err = service.initialize().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigError::InvalidUrl { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.state(), InitializationState::Failed);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_configuration_error() {
        let service = SupabaseService::new(
            FlakyConnector::new(0),
            CredentialResolver::new(vec![Box::new(BuildTimeProvider::new(
                Some("https://x.supabase.co"),
                Some(""),
            ))]),
        );

        assert!(matches!(
            service.initialize().await,
            Err(Error::Configuration(ConfigError::Missing { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_initialization_clears_in_progress() {
        let connector = FlakyConnector::new(0).with_latency(Duration::from_secs(60));
        let (service, _calls) = service(connector);

        let result = tokio::time::timeout(Duration::from_secs(1), service.initialize()).await;
        assert!(result.is_err());
        assert_eq!(service.state(), InitializationState::Uninitialized);
    }

    #[test]
    fn test_accessors_before_initialize() {
        let (service, _calls) = service(FlakyConnector::new(0));

        assert!(service.current_user_id().is_none());
        assert!(!service.is_authenticated());
        assert!(service.try_client().is_none());
        assert!(matches!(service.client(), Err(Error::NotInitialized)));
        assert!(matches!(
            service.auth_state_changes(),
            Err(Error::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_accessors_forward_to_client() {
        let (service, _calls) = service(FlakyConnector::new(0).with_user("user-9"));
        service.initialize().await.unwrap();

        assert_eq!(service.current_user_id().as_deref(), Some("user-9"));
        assert!(service.is_authenticated());

        let client = service.client().unwrap();
        let mut rx = service.auth_state_changes().unwrap();
        let change = AuthStateChange {
            event: AuthChangeEvent::SignedIn,
            session: Some(Session {
                access_token: "at".to_string(),
                refresh_token: "rt".to_string(),
                expires_at: Utc::now(),
                user: User {
                    id: "user-9".to_string(),
                    email: None,
                    phone: None,
                    role: None,
                    created_at: None,
                },
            }),
        };
        client.events.send(change.clone()).unwrap();
        assert_eq!(rx.recv().await.unwrap(), change);
    }

    #[tokio::test]
    async fn test_dispose_returns_to_uninitialized() {
        let (service, calls) = service(FlakyConnector::new(0));
        service.initialize().await.unwrap();

        service.dispose();
        assert_eq!(service.state(), InitializationState::Uninitialized);
        assert!(service.try_client().is_none());

        service.initialize().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
