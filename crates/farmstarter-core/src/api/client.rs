//! API client for the FARM Starter REST API.
//!
//! This module provides the `ApiClient` struct for registration, sign-in,
//! sign-out and the authenticated user fetches, and the `AuthApi` trait the
//! session layer talks to.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{NewUser, RegisteredUser, SignInRequest, TokenResponse, User};

use super::error::truncate_body;
use super::{AuthError, Operation};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const REGISTER_PATH: &str = "/api/users";
const SIGNIN_PATH: &str = "/auth/signin";
const SIGNOUT_PATH: &str = "/auth/signout";
const USERS_PATH: &str = "/api/users";

/// Remote calls the session layer depends on.
///
/// Every method is a single round trip with no retries. Failures come back
/// already normalized into `AuthError` so callers never see transport errors.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisteredUser, AuthError>;

    /// Exchange email and password for an access token
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError>;

    /// Invalidate `credential` on the server
    async fn sign_out(&self, credential: &str) -> Result<(), AuthError>;

    async fn list_users(&self, credential: &str) -> Result<Vec<User>, AuthError>;

    async fn get_user(&self, credential: &str, user_id: &str) -> Result<User, AuthError>;
}

/// API client for a FARM Starter backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client with the default timeout
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of one user; the id is escaped as a single path segment
    fn user_url(&self, op: Operation, user_id: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.url(USERS_PATH)).map_err(|_| op.fallback())?;
        url.path_segments_mut()
            .map_err(|_| op.fallback())?
            .push(user_id);
        Ok(url)
    }

    fn auth_headers(op: Operation, credential: &str) -> Result<header::HeaderMap, AuthError> {
        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(&format!("Bearer {}", credential))
            .map_err(|_| op.fallback())?;
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    /// Send a request, mapping transport failures and non-success statuses
    /// into the operation's error.
    async fn send(&self, op: Operation, request: RequestBuilder) -> Result<Response, AuthError> {
        let response = request.send().await.map_err(|e| {
            warn!(operation = ?op, error = %e, "Request failed");
            op.fallback()
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(operation = ?op, %status, "Request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            operation = ?op,
            %status,
            body = %truncate_body(&body),
            "Request rejected"
        );
        Err(op.from_body(&body))
    }

    async fn json<T: DeserializeOwned>(op: Operation, response: Response) -> Result<T, AuthError> {
        response.json().await.map_err(|e| {
            warn!(operation = ?op, error = %e, "Failed to parse response");
            op.fallback()
        })
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisteredUser, AuthError> {
        let op = Operation::Register;
        let body = NewUser {
            name,
            email,
            password,
        };
        let request = self.client.post(self.url(REGISTER_PATH)).json(&body);
        let response = self.send(op, request).await?;

        // The created user's shape is up to the server; an unexpected body
        // still means the account exists
        Ok(response.json().await.unwrap_or_default())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let op = Operation::SignIn;
        let request = self
            .client
            .post(self.url(SIGNIN_PATH))
            .json(&SignInRequest { email, password });
        let response = self.send(op, request).await?;
        let token: TokenResponse = Self::json(op, response).await?;
        Ok(token.access_token)
    }

    async fn sign_out(&self, credential: &str) -> Result<(), AuthError> {
        let op = Operation::SignOut;
        let request = self
            .client
            .post(self.url(SIGNOUT_PATH))
            .headers(Self::auth_headers(op, credential)?);
        self.send(op, request).await?;
        Ok(())
    }

    async fn list_users(&self, credential: &str) -> Result<Vec<User>, AuthError> {
        let op = Operation::ListUsers;
        let request = self
            .client
            .get(self.url(USERS_PATH))
            .headers(Self::auth_headers(op, credential)?);
        let response = self.send(op, request).await?;
        Self::json(op, response).await
    }

    async fn get_user(&self, credential: &str, user_id: &str) -> Result<User, AuthError> {
        let op = Operation::GetUser;
        let url = self.user_url(op, user_id)?;
        let request = self
            .client
            .get(url)
            .headers(Self::auth_headers(op, credential)?);
        let response = self.send(op, request).await?;
        Self::json(op, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url(SIGNIN_PATH), "http://localhost:8000/auth/signin");
    }

    #[test]
    fn test_user_url_escapes_id() {
        let client = ApiClient::new("http://localhost:8000").unwrap();
        let url = |id: &str| client.user_url(Operation::GetUser, id).unwrap().to_string();

        assert_eq!(url("42"), "http://localhost:8000/api/users/42");
        assert_eq!(url("%2e%2e"), "http://localhost:8000/api/users/%252e%252e");
        assert_eq!(url("a/b"), "http://localhost:8000/api/users/a%2Fb");
    }

    #[test]
    fn test_auth_headers() {
        let headers = ApiClient::auth_headers(Operation::SignOut, "a.b.c").unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer a.b.c");

        let err = ApiClient::auth_headers(Operation::SignOut, "bad\ntoken").unwrap_err();
        assert!(matches!(err, AuthError::SignOut(ref m) if m == "Sign out failed"));
    }
}
