//! # Latch Session
//!
//! Client-side session and identity management.
//!
//! A [`SessionManager`] establishes a durable client fingerprint, keeps the
//! session token and JWT across restarts, mirrors them into cookies for the
//! backend, and ends the session when any part of the host emits a
//! [`LogoutSignal`].
//!
//! ## Modules
//!
//! - [`api`] - HTTP client for the authentication backend
//! - [`config`] - Endpoint and routing configuration
//! - [`cookie`] - Cookie mirror of the stored credentials
//! - [`identity`] - Client fingerprint resolution
//! - [`manager`] - Login/register/logout lifecycle
//! - [`navigator`] - Post-logout navigation hook
//! - [`signal`] - Page-wide logout signal
//! - [`store`] - Credential persistence
//!
//! Storage, cookies, the signal bus and navigation are traits, so hosts
//! without a browser supply their own backends.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use latch_session::{
//!     AuthState, LocalSignalBus, LogoutSignal, MemoryCookieJar, RecordingNavigator,
//!     SessionConfig, SessionManager, SignalBus,
//! };
//!
//! let bus = Arc::new(LocalSignalBus::new());
//! let navigator = Arc::new(RecordingNavigator::new());
//! let session = SessionManager::builder(SessionConfig::default())
//!     .cookie_writer(Arc::new(MemoryCookieJar::new()))
//!     .signal_bus(bus.clone())
//!     .navigator(navigator.clone())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(session.auth_state(), AuthState::LoggedOut);
//!
//! // Without a listener installed by `init`, nobody reacts to the signal.
//! assert_eq!(bus.emit(&LogoutSignal::default()), 0);
//! assert_eq!(navigator.count(), 0);
//! ```

pub mod api;
pub mod config;
pub mod cookie;
pub mod identity;
pub mod manager;
pub mod navigator;
pub mod signal;
pub mod store;

pub use api::{ApiError, ApiResult, AuthClient, AuthResponse, CredentialsRequest, LogoutRequest};
pub use config::{ConfigError, Endpoints, SessionConfig};
pub use cookie::{Cookie, CookieSynchronizer, CookieWriter, MemoryCookieJar, ReqwestCookieWriter};
pub use identity::{ClientIdentity, IdentityResolver};
pub use manager::{AuthState, LogoutHandle, SessionManager, SessionManagerBuilder};
pub use navigator::{LogNavigator, Navigator, RecordingNavigator};
pub use signal::{LocalSignalBus, LogoutSignal, SignalBus, SignalHandler, SubscriptionId};
pub use store::{
    CredentialPair, CredentialStore, FileStore, KeyValueStore, MemoryStore, StorageKey,
    StoreError,
};
