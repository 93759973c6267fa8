//! # API Types
//!
//! Request and response bodies exchanged with the authentication backend
//! and the identity lookup service.

use serde::{Deserialize, Serialize};

use super::error::ApiError;

/// Body sent to the login and register endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    /// Account email.
    pub email: String,
    /// Account password, sent as-is over the configured transport.
    pub password: String,
    /// Client fingerprint identifying the auth attempt.
    pub client_identity: String,
}

impl CredentialsRequest {
    /// Builds a request from borrowed parts.
    #[must_use]
    pub fn new(email: &str, password: &str, client_identity: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            client_identity: client_identity.to_string(),
        }
    }
}

/// Wire shape of a successful login/register response.
///
/// Every field is optional on the wire; [`RawAuthResponse::into_auth`]
/// enforces which ones are required.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawAuthResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "jwtToken")]
    jwt_token: Option<String>,
    #[serde(default, rename = "clientIdentity", alias = "clientIpAddress")]
    client_identity: Option<String>,
}

/// A validated login/register payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// Opaque session token.
    pub session_token: String,
    /// JWT; its presence in storage is what makes the client logged in.
    pub jwt: String,
    /// Client identity echoed by the backend, if any.
    pub client_identity: Option<String>,
}

impl RawAuthResponse {
    /// Validates the wire payload, requiring both token and JWT.
    pub(crate) fn into_auth(self) -> Result<AuthResponse, ApiError> {
        let session_token = non_empty(self.token)
            .ok_or_else(|| ApiError::MalformedResponse("missing token".to_string()))?;
        let jwt = non_empty(self.jwt_token)
            .ok_or_else(|| ApiError::MalformedResponse("missing jwtToken".to_string()))?;

        Ok(AuthResponse {
            session_token,
            jwt,
            client_identity: non_empty(self.client_identity),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Body sent to the logout endpoint.
///
/// Fields are nullable: logout is still reported when local state was
/// already partially gone.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutRequest {
    /// Session token being invalidated.
    pub token: Option<String>,
    /// JWT being invalidated.
    #[serde(rename = "jwtToken")]
    pub jwt_token: Option<String>,
}

/// Error body returned by the backend on non-success responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: String,
}

/// Response of the identity lookup service.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AddressLookup {
    #[serde(default)]
    pub(crate) ip: Option<String>,
}
