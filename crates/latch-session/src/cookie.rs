//! # Cookie Mirror
//!
//! Copies the persisted identity and credentials into cookies so backend
//! requests carry them outside the JSON API, and clears them together.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::cookie::Jar;
use reqwest::Url;

use crate::store::{CredentialStore, StorageKey};

/// Expiry written when clearing a cookie.
pub const EPOCH_EXPIRY: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Mirrored cookies, in write order.
///
/// Cookie names are a wire concern, independent of the storage key names.
pub const MIRRORED_COOKIES: [(StorageKey, &str); 3] = [
    (StorageKey::ClientIdentity, "clientIpAddress"),
    (StorageKey::SessionToken, "token"),
    (StorageKey::Jwt, "jwtToken"),
];

/// A single cookie write.
///
/// Always `Path=/` and `SameSite=Strict`; a live cookie has no expiry and
/// lasts for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value; empty for expired cookies.
    pub value: String,
    expired: bool,
}

impl Cookie {
    /// A session-scoped cookie.
    pub fn session(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expired: false,
        }
    }

    /// A cookie dated in the past, which removes any existing one.
    pub fn expired(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            expired: true,
        }
    }

    /// Whether this write removes the cookie.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

/// Renders the `Set-Cookie` form of the cookie.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path=/; SameSite=Strict", self.name, self.value)?;
        if self.expired {
            write!(f, "; Expires={EPOCH_EXPIRY}")?;
        }
        Ok(())
    }
}

/// Sink for cookie writes.
///
/// Writes cannot fail from the caller's point of view.
pub trait CookieWriter: Send + Sync {
    /// Applies one cookie write.
    fn write(&self, cookie: &Cookie);
}

#[derive(Debug, Default)]
struct JarState {
    log: Vec<Cookie>,
    live: HashMap<String, String>,
}

/// In-memory [`CookieWriter`] that records every write.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    state: Mutex<JarState>,
}

impl MemoryCookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a live cookie.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.state.lock().live.get(name).cloned()
    }

    /// Number of live cookies.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Every write so far, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<Cookie> {
        self.state.lock().log.clone()
    }
}

impl CookieWriter for MemoryCookieJar {
    fn write(&self, cookie: &Cookie) {
        let mut state = self.state.lock();
        if cookie.is_expired() {
            state.live.remove(&cookie.name);
        } else {
            state.live.insert(cookie.name.clone(), cookie.value.clone());
        }
        state.log.push(cookie.clone());
    }
}

/// [`CookieWriter`] feeding a `reqwest` cookie jar.
///
/// Share the jar with [`AuthClient::with_cookie_jar`](crate::AuthClient::with_cookie_jar)
/// so every backend request carries the mirror.
#[derive(Debug, Clone)]
pub struct ReqwestCookieWriter {
    jar: Arc<Jar>,
    url: Url,
}

impl ReqwestCookieWriter {
    /// Writes cookies scoped to the origin of `url`.
    pub fn new(jar: Arc<Jar>, url: Url) -> Self {
        Self { jar, url }
    }

    /// The underlying jar.
    #[must_use]
    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }
}

impl CookieWriter for ReqwestCookieWriter {
    fn write(&self, cookie: &Cookie) {
        self.jar.add_cookie_str(&cookie.to_string(), &self.url);
    }
}

/// Keeps the cookie mirror equal to the credential store.
#[derive(Clone)]
pub struct CookieSynchronizer {
    store: CredentialStore,
    writer: Arc<dyn CookieWriter>,
}

impl CookieSynchronizer {
    /// Mirrors `store` into `writer`.
    pub fn new(store: CredentialStore, writer: Arc<dyn CookieWriter>) -> Self {
        Self { store, writer }
    }

    /// Writes all mirrored cookies from the current stored values.
    ///
    /// Absent values are written empty.
    pub fn sync_all(&self) {
        for (key, name) in MIRRORED_COOKIES {
            let value = self.store.get(key).unwrap_or_default();
            self.writer.write(&Cookie::session(name, value));
        }
        tracing::debug!("Cookie mirror synced");
    }

    /// Expires all mirrored cookies.
    pub fn clear_all(&self) {
        for (_, name) in MIRRORED_COOKIES {
            self.writer.write(&Cookie::expired(name));
        }
        tracing::debug!("Cookie mirror cleared");
    }
}
