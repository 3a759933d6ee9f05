//! Session token issuance for hosted widget sessions.
//!
//! Every ramp attempt authorizes its widget popup with a short-lived bearer
//! token scoped to the user's wallet address, the requested assets, and the
//! target chain. Tokens are requested from the application's token endpoint
//! with a single POST; the token lives exactly as long as one popup session
//! and is never reused.
//!
//! [`HttpTokenIssuer`] is the production client. [`StaticTokenIssuer`]
//! serves demo and test flows that must not touch the network, in the same
//! way the executor stack offers a dry-run variant.

use alloy::primitives::Address;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::network::Chain;

#[derive(Debug, thiserror::Error)]
pub enum SessionTokenError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("token endpoint rejected the request (status {status}): {message}")]
    Api { status: StatusCode, message: String },
}

/// Opaque bearer token authorizing one widget session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Bearer material stays out of logs.
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressEntry {
    pub address: Address,
    pub blockchains: Vec<String>,
}

/// Body of the token issuance POST.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokenRequest {
    pub addresses: Vec<AddressEntry>,
    pub assets: Vec<String>,
}

impl SessionTokenRequest {
    /// Request scoped to a single address on a single chain.
    pub fn single(address: Address, chain: Chain, asset: &str) -> Self {
        Self {
            addresses: vec![AddressEntry {
                address,
                blockchains: vec![chain.slug().to_string()],
            }],
            assets: vec![asset.to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionTokenResponse {
    token: String,
}

/// Capability seam for session token acquisition.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue_session_token(
        &self,
        request: &SessionTokenRequest,
    ) -> Result<SessionToken, SessionTokenError>;
}

/// HTTP client for the application's token endpoint.
pub struct HttpTokenIssuer {
    client: reqwest::Client,
    endpoint: Url,
    max_retries: usize,
    min_retry_delay: std::time::Duration,
}

impl HttpTokenIssuer {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            max_retries: 3,
            min_retry_delay: std::time::Duration::from_secs(1),
        }
    }

    /// Bound on retries of server-side failures. Client-side rejections
    /// are never retried.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_min_retry_delay(mut self, delay: std::time::Duration) -> Self {
        self.min_retry_delay = delay;
        self
    }

    async fn request_once(
        &self,
        request: &SessionTokenRequest,
    ) -> Result<SessionToken, SessionTokenError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(SessionTokenError::Api { status, message });
        }

        let body: SessionTokenResponse = response.json().await?;

        Ok(SessionToken(body.token))
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue_session_token(
        &self,
        request: &SessionTokenRequest,
    ) -> Result<SessionToken, SessionTokenError> {
        let backoff = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_retry_delay);

        (|| async { self.request_once(request).await })
            .retry(backoff)
            .when(|err| {
                matches!(err, SessionTokenError::Api { status, .. } if status.is_server_error())
            })
            .await
    }
}

/// Issuer returning a fixed token, for offline demos and tests.
pub struct StaticTokenIssuer {
    token: SessionToken,
}

impl StaticTokenIssuer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SessionToken::new(token),
        }
    }
}

#[async_trait]
impl TokenIssuer for StaticTokenIssuer {
    async fn issue_session_token(
        &self,
        _request: &SessionTokenRequest,
    ) -> Result<SessionToken, SessionTokenError> {
        Ok(self.token.clone())
    }
}
