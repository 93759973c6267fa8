//! # Client Identity
//!
//! Derives and persists a stable per-profile client fingerprint.
//!
//! The fingerprint is the caller's public network address when the lookup
//! service answers, otherwise a random UUID. Once persisted it is returned
//! as-is on every later resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AuthClient;
use crate::store::CredentialStore;

/// Stable string fingerprinting a client profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Generates a random fallback identity (UUID v4).
    #[must_use]
    pub fn generate_fallback() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identity is a generated UUID rather than an address.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        Uuid::parse_str(&self.0).is_ok()
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ClientIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Resolves the client identity, persisting it on first use.
#[derive(Clone)]
pub struct IdentityResolver {
    store: CredentialStore,
    client: AuthClient,
}

impl IdentityResolver {
    /// Creates a resolver writing to `store` and looking up through `client`.
    pub fn new(store: CredentialStore, client: AuthClient) -> Self {
        Self { store, client }
    }

    /// Returns the persisted identity, resolving and persisting one first
    /// if none exists.
    ///
    /// Never fails: if the address lookup fails the generated fallback is
    /// persisted instead.
    pub async fn resolve(&self) -> ClientIdentity {
        if let Some(existing) = self.store.client_identity() {
            tracing::debug!(identity = %existing, "Client identity already persisted");
            return existing;
        }

        let fallback = ClientIdentity::generate_fallback();

        let identity = match self.client.lookup_address().await {
            Ok(address) => {
                tracing::info!(identity = %address, "Resolved client identity from network address");
                ClientIdentity::from(address)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    identity = %fallback,
                    "Address lookup failed, keeping generated identity"
                );
                fallback
            }
        };

        self.store.set_client_identity(&identity);
        identity
    }
}
