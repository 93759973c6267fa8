//! # Session Manager
//!
//! Owns the two-state authentication lifecycle.
//!
//! ```text
//!            login / register (2xx)
//!   LoggedOut ----------------------> LoggedIn
//!       ^                                 |
//!       +---- logout() / LogoutSignal ----+
//! ```
//!
//! The state is never stored; it is read from the presence of the JWT in
//! the credential store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::api::{ApiResult, AuthClient, AuthResponse, CredentialsRequest, LogoutRequest};
use crate::config::SessionConfig;
use crate::cookie::{CookieSynchronizer, CookieWriter, MemoryCookieJar};
use crate::identity::{ClientIdentity, IdentityResolver};
use crate::navigator::{LogNavigator, Navigator};
use crate::signal::{LocalSignalBus, LogoutSignal, SignalBus, SubscriptionId};
use crate::store::{CredentialStore, KeyValueStore, MemoryStore};

/// Authentication state derived from stored credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No JWT is stored.
    LoggedOut,
    /// A JWT is stored.
    LoggedIn,
}

impl AuthState {
    /// Derives the state from an optional JWT.
    #[must_use]
    pub fn from_jwt(jwt: Option<&str>) -> Self {
        match jwt {
            Some(jwt) if !jwt.is_empty() => Self::LoggedIn,
            _ => Self::LoggedOut,
        }
    }
}

struct Inner {
    client: AuthClient,
    store: CredentialStore,
    cookies: CookieSynchronizer,
    resolver: IdentityResolver,
    bus: Arc<dyn SignalBus>,
    navigator: Arc<dyn Navigator>,
    entry_route: String,
    initialized: AtomicBool,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.get_mut().take() {
            self.bus.unsubscribe(id);
        }
    }
}

/// Orchestrates login, registration and logout.
///
/// Build one per application with [`SessionManager::builder`] and share
/// clones; clones refer to the same session.
///
/// # Examples
///
/// ```rust,ignore
/// use latch_session::{SessionConfig, SessionManager};
///
/// let session = SessionManager::builder(SessionConfig::load()).build()?;
/// let identity = session.init().await;
///
/// session.login("a@b.com", "pw", &identity).await?;
/// assert!(session.is_logged_in());
///
/// session.logout().wait().await;
/// ```
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Starts building a manager for `config`.
    #[must_use]
    pub fn builder(config: SessionConfig) -> SessionManagerBuilder {
        SessionManagerBuilder::new(config)
    }

    /// Idempotent bootstrap.
    ///
    /// Installs the logout listener on the first call only, and resolves
    /// the client identity if none is persisted. The first call also
    /// rewrites the cookie mirror when stored credentials survived a
    /// restart, since a fresh cookie sink starts empty. Returns the identity.
    pub async fn init(&self) -> ClientIdentity {
        let first = self.install_logout_listener();

        let identity = match self.inner.store.client_identity() {
            Some(identity) => identity,
            None => self.inner.resolver.resolve().await,
        };

        if first && self.is_logged_in() {
            self.inner.cookies.sync_all();
            tracing::info!("Restored cookie mirror from stored session");
        }

        identity
    }

    /// Returns `true` if this call installed the listener.
    fn install_logout_listener(&self) -> bool {
        if self
            .inner
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Logout listener already installed");
            return false;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = self
            .inner
            .bus
            .subscribe(Arc::new(move |signal: &LogoutSignal| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                tracing::info!(
                    reason = signal.message.as_deref().unwrap_or_default(),
                    "Logout signal received"
                );
                // Dropping the handle leaves the notification detached.
                let _ = SessionManager { inner }.logout();
            }));

        *self.inner.subscription.lock() = Some(id);
        tracing::info!("Session manager initialized");
        true
    }

    /// Whether [`SessionManager::init`] has installed the logout listener.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Logs in an existing account.
    ///
    /// On success the identity the server returns replaces any stored one
    /// and the cookie mirror is rewritten. On failure nothing local changes.
    ///
    /// # Errors
    ///
    /// * [`ApiError::Network`](crate::ApiError::Network) - Backend unreachable
    /// * [`ApiError::Server`](crate::ApiError::Server) - Rejected; carries status text and server message
    /// * [`ApiError::MalformedResponse`](crate::ApiError::MalformedResponse) - Token or JWT missing
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client_identity: &ClientIdentity,
    ) -> ApiResult<AuthResponse> {
        let req = CredentialsRequest::new(email, password, client_identity.as_str());
        let auth = self
            .inner
            .client
            .login(&req)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

        self.establish(&auth, client_identity);
        Ok(auth)
    }

    /// Registers a new account and logs it in.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::login`].
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        client_identity: &ClientIdentity,
    ) -> ApiResult<AuthResponse> {
        let req = CredentialsRequest::new(email, password, client_identity.as_str());
        let auth = self
            .inner
            .client
            .register(&req)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Registration failed"))?;

        self.establish(&auth, client_identity);
        Ok(auth)
    }

    fn establish(&self, auth: &AuthResponse, sent_identity: &ClientIdentity) {
        let store = &self.inner.store;

        let identity = auth
            .client_identity
            .clone()
            .map(ClientIdentity::from)
            .unwrap_or_else(|| sent_identity.clone());

        store.set_credentials(&auth.session_token, &auth.jwt);
        store.set_client_identity(&identity);

        self.inner.cookies.sync_all();
        tracing::info!("Session established");
    }

    /// Ends the session.
    ///
    /// Storage and cookies are cleared before this returns. The backend is
    /// then notified in a background task whose outcome is only logged,
    /// after which the navigator is sent to the entry route exactly once.
    /// The returned handle may be dropped or awaited.
    ///
    /// Outside a tokio runtime the notification is skipped and navigation
    /// happens before returning.
    pub fn logout(&self) -> LogoutHandle {
        let inner = &self.inner;
        let request = LogoutRequest {
            token: inner.store.session_token(),
            jwt_token: inner.store.jwt(),
        };

        inner.store.clear_all();
        inner.cookies.clear_all();
        tracing::info!("Session cleared");

        let client = inner.client.clone();
        let navigator = inner.navigator.clone();
        let route = inner.entry_route.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => LogoutHandle {
                task: Some(runtime.spawn(async move {
                    notify_backend(&client, &request).await;
                    navigator.navigate(&route);
                })),
            },
            Err(_) => {
                tracing::warn!("No async runtime, skipping backend logout notification");
                navigator.navigate(&route);
                LogoutHandle { task: None }
            }
        }
    }

    /// Current authentication state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        AuthState::from_jwt(self.inner.store.jwt().as_deref())
    }

    /// Whether a JWT is stored.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.auth_state() == AuthState::LoggedIn
    }

    /// Stored session token.
    #[must_use]
    pub fn session_token(&self) -> Option<String> {
        self.inner.store.session_token()
    }

    /// Stored JWT.
    #[must_use]
    pub fn jwt(&self) -> Option<String> {
        self.inner.store.jwt()
    }

    /// Persisted client identity.
    #[must_use]
    pub fn client_identity(&self) -> Option<ClientIdentity> {
        self.inner.store.client_identity()
    }

    /// The signal bus this manager listens on.
    #[must_use]
    pub fn signal_bus(&self) -> Arc<dyn SignalBus> {
        self.inner.bus.clone()
    }
}

async fn notify_backend(client: &AuthClient, request: &LogoutRequest) {
    match client.logout(request).await {
        Ok(ack) => tracing::info!(%ack, "Backend acknowledged logout"),
        Err(e) => tracing::warn!(error = %e, "Backend logout notification failed"),
    }
}

/// Background part of a logout: backend notification, then navigation.
#[must_use = "drop the handle to detach, or call `wait` to join"]
#[derive(Debug)]
pub struct LogoutHandle {
    task: Option<JoinHandle<()>>,
}

impl LogoutHandle {
    /// Waits for the notification and navigation to finish.
    pub async fn wait(self) {
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Logout task failed");
            }
        }
    }
}

/// Builder for [`SessionManager`].
///
/// Unset capabilities default to in-memory storage and cookies, a local
/// signal bus and a logging navigator.
pub struct SessionManagerBuilder {
    config: SessionConfig,
    client: Option<AuthClient>,
    storage: Option<Arc<dyn KeyValueStore>>,
    cookies: Option<Arc<dyn CookieWriter>>,
    bus: Option<Arc<dyn SignalBus>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl SessionManagerBuilder {
    fn new(config: SessionConfig) -> Self {
        Self {
            config,
            client: None,
            storage: None,
            cookies: None,
            bus: None,
            navigator: None,
        }
    }

    /// Uses a preconfigured HTTP client, e.g. one sharing a cookie jar.
    #[must_use]
    pub fn client(mut self, client: AuthClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Backing medium for the credential store.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sink for the cookie mirror.
    #[must_use]
    pub fn cookie_writer(mut self, writer: Arc<dyn CookieWriter>) -> Self {
        self.cookies = Some(writer);
        self
    }

    /// Bus carrying the logout signal.
    #[must_use]
    pub fn signal_bus(mut self, bus: Arc<dyn SignalBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Navigator used after logout.
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Builds the manager.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`](crate::ApiError::Network) if no client
    /// was supplied and the default one cannot be created.
    pub fn build(self) -> ApiResult<SessionManager> {
        let client = match self.client {
            Some(client) => client,
            None => AuthClient::new(&self.config)?,
        };
        let store = CredentialStore::new(
            self.storage
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
        );
        let cookies = CookieSynchronizer::new(
            store.clone(),
            self.cookies
                .unwrap_or_else(|| Arc::new(MemoryCookieJar::new())),
        );
        let resolver = IdentityResolver::new(store.clone(), client.clone());

        Ok(SessionManager {
            inner: Arc::new(Inner {
                client,
                store,
                cookies,
                resolver,
                bus: self.bus.unwrap_or_else(|| Arc::new(LocalSignalBus::new())),
                navigator: self.navigator.unwrap_or_else(|| Arc::new(LogNavigator)),
                entry_route: self.config.entry_route,
                initialized: AtomicBool::new(false),
                subscription: Mutex::new(None),
            }),
        })
    }
}
