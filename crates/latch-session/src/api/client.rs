//! # API Client
//!
//! HTTP client for the authentication backend and the identity lookup
//! service.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, Response};

use super::error::{ApiError, ApiResult};
use super::types::{
    AddressLookup, AuthResponse, CredentialsRequest, ErrorBody, LogoutRequest, RawAuthResponse,
};
use crate::config::SessionConfig;

/// HTTP client for the authentication endpoints.
///
/// The client is cheaply cloneable; clones share one connection pool and,
/// when configured, one cookie jar.
///
/// # Examples
///
/// ```rust,ignore
/// use latch_session::{AuthClient, CredentialsRequest, SessionConfig};
///
/// let client = AuthClient::new(&SessionConfig::default())?;
/// let auth = client
///     .login(&CredentialsRequest::new("a@b.com", "pw", "203.0.113.7"))
///     .await?;
/// println!("jwt: {}", auth.jwt);
/// ```
#[derive(Clone, Debug)]
pub struct AuthClient {
    login_url: String,
    register_url: String,
    logout_url: String,
    lookup_url: String,
    http: Client,
}

impl AuthClient {
    /// Creates a client for the endpoints in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the TLS backend cannot be initialized.
    pub fn new(config: &SessionConfig) -> ApiResult<Self> {
        Self::build(config, None)
    }

    /// Creates a client whose requests carry the cookies stored in `jar`.
    ///
    /// Pair this with a [`ReqwestCookieWriter`](crate::ReqwestCookieWriter)
    /// on the same jar so the cookie mirror reaches the backend.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the TLS backend cannot be initialized.
    pub fn with_cookie_jar(config: &SessionConfig, jar: Arc<Jar>) -> ApiResult<Self> {
        Self::build(config, Some(jar))
    }

    fn build(config: &SessionConfig, jar: Option<Arc<Jar>>) -> ApiResult<Self> {
        let mut builder =
            Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));
        if let Some(jar) = jar {
            builder = builder.cookie_provider(jar);
        }

        Ok(Self {
            login_url: config.endpoint_url(&config.endpoints.login),
            register_url: config.endpoint_url(&config.endpoints.register),
            logout_url: config.endpoint_url(&config.endpoints.logout),
            lookup_url: config.identity_lookup_url.clone(),
            http: builder.build()?,
        })
    }

    /// Authenticates an existing account.
    ///
    /// # Errors
    ///
    /// * [`ApiError::Network`] - Request failed in transit
    /// * [`ApiError::Server`] - Non-2xx, e.g. bad credentials (401)
    /// * [`ApiError::MalformedResponse`] - `token` or `jwtToken` missing
    pub async fn login(&self, req: &CredentialsRequest) -> ApiResult<AuthResponse> {
        self.post_credentials(&self.login_url, req).await
    }

    /// Creates an account and authenticates it.
    ///
    /// # Errors
    ///
    /// Same as [`AuthClient::login`].
    pub async fn register(&self, req: &CredentialsRequest) -> ApiResult<AuthResponse> {
        self.post_credentials(&self.register_url, req).await
    }

    /// Tells the backend the session is over.
    ///
    /// Returns the acknowledgement body: parsed JSON when possible,
    /// otherwise the raw text as a JSON string.
    ///
    /// # Errors
    ///
    /// * [`ApiError::Network`] - Request failed in transit
    /// * [`ApiError::Server`] - Backend rejected the notification
    pub async fn logout(&self, req: &LogoutRequest) -> ApiResult<serde_json::Value> {
        let res = self.http.post(&self.logout_url).json(req).send().await?;

        if !res.status().is_success() {
            return Err(server_error(res).await);
        }

        let body = res.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }

    /// Asks the lookup service for the caller's public network address.
    ///
    /// # Errors
    ///
    /// * [`ApiError::Network`] - Service unreachable
    /// * [`ApiError::Server`] - Service answered non-2xx
    /// * [`ApiError::MalformedResponse`] - No usable `ip` field
    pub async fn lookup_address(&self) -> ApiResult<String> {
        let res = self.http.get(&self.lookup_url).send().await?;

        if !res.status().is_success() {
            return Err(server_error(res).await);
        }

        let lookup: AddressLookup = res
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

        lookup
            .ip
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("missing ip".to_string()))
    }

    async fn post_credentials(
        &self,
        url: &str,
        req: &CredentialsRequest,
    ) -> ApiResult<AuthResponse> {
        let res = self.http.post(url).json(req).send().await?;

        if !res.status().is_success() {
            return Err(server_error(res).await);
        }

        let raw: RawAuthResponse = res
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

        raw.into_auth()
    }
}

/// Converts a non-success response into [`ApiError::Server`].
async fn server_error(res: Response) -> ApiError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);

    ApiError::Server {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        message,
    }
}
