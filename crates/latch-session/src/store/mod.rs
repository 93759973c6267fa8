//! # Credential Storage
//!
//! Durable key-value persistence for the client identity and the
//! credential pair.
//!
//! ## Components
//!
//! - [`KeyValueStore`] - Capability trait for the backing medium
//! - [`MemoryStore`] - In-process backend
//! - [`FileStore`] - JSON file backend
//! - [`CredentialStore`] - Typed view over the fixed key namespace

mod file;
mod memory;

use std::sync::Arc;

use thiserror::Error;

use crate::identity::ClientIdentity;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised while opening or flushing a persistent backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The platform has no user configuration directory.
    #[error("could not determine storage directory")]
    NoStorageDir,

    /// Reading or writing the backing file failed.
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file does not contain a valid document.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Backing medium for a [`CredentialStore`].
///
/// Operations are infallible from the caller's side; persistent
/// implementations log write failures instead of surfacing them.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: &str);

    /// Removes a value. Removing an absent key does nothing.
    fn remove(&self, key: &str);
}

/// The fixed key namespace of the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Stable client fingerprint.
    ClientIdentity,
    /// Opaque session token.
    SessionToken,
    /// JWT.
    Jwt,
}

impl StorageKey {
    /// Every key, in mirror order.
    pub const ALL: [StorageKey; 3] = [Self::ClientIdentity, Self::SessionToken, Self::Jwt];

    /// Key name in the backing store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientIdentity => "client_identity",
            Self::SessionToken => "session_token",
            Self::Jwt => "jwt",
        }
    }
}

/// Snapshot of the two client-held session indicators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPair {
    /// Opaque session token.
    pub session_token: Option<String>,
    /// JWT.
    pub jwt: Option<String>,
}

/// Typed accessors over a [`KeyValueStore`].
///
/// Empty strings read back as absent.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    /// Wraps a backend.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Creates a store over a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Reads one key.
    #[must_use]
    pub fn get(&self, key: StorageKey) -> Option<String> {
        self.backend.get(key.as_str()).filter(|v| !v.is_empty())
    }

    /// Overwrites one key.
    pub fn set(&self, key: StorageKey, value: &str) {
        self.backend.set(key.as_str(), value);
    }

    /// Removes one key.
    pub fn clear(&self, key: StorageKey) {
        self.backend.remove(key.as_str());
    }

    /// The persisted client identity, if any.
    #[must_use]
    pub fn client_identity(&self) -> Option<ClientIdentity> {
        self.get(StorageKey::ClientIdentity).map(ClientIdentity::from)
    }

    /// Persists the client identity.
    pub fn set_client_identity(&self, identity: &ClientIdentity) {
        self.set(StorageKey::ClientIdentity, identity.as_str());
    }

    /// The persisted session token, if any.
    #[must_use]
    pub fn session_token(&self) -> Option<String> {
        self.get(StorageKey::SessionToken)
    }

    /// The persisted JWT, if any.
    #[must_use]
    pub fn jwt(&self) -> Option<String> {
        self.get(StorageKey::Jwt)
    }

    /// Reads the credential pair.
    #[must_use]
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair {
            session_token: self.session_token(),
            jwt: self.jwt(),
        }
    }

    /// Writes both halves of the credential pair.
    pub fn set_credentials(&self, session_token: &str, jwt: &str) {
        self.set(StorageKey::SessionToken, session_token);
        self.set(StorageKey::Jwt, jwt);
    }

    /// Removes every key, identity included.
    pub fn clear_all(&self) {
        for key in StorageKey::ALL {
            self.clear(key);
        }
    }
}
