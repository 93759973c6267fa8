//! # API Client
//!
//! HTTP plumbing for the authentication backend.
//!
//! This module provides the [`AuthClient`] used by the session manager and
//! the identity resolver.

mod client;
mod error;
mod types;

pub use client::AuthClient;
pub use error::{ApiError, ApiResult};
pub use types::{AuthResponse, CredentialsRequest, LogoutRequest};
