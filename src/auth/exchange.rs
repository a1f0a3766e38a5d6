//! Code-for-credential exchange
//!
//! The exchange talks to the backend directly with the shared HTTP client.
//! It never goes through the request pipeline, which would wait on the very
//! gate this exchange resolves.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::storage::Credential;

/// Why an exchange did not produce a credential
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeFailure {
    /// Endpoint answered with a non-success status (bad or expired code)
    #[error("exchange rejected with HTTP {status}")]
    Rejected {
        /// HTTP status code
        status: u16,
    },

    /// No answer within the exchange timeout
    #[error("exchange timed out after {0:?}")]
    Timeout(Duration),

    /// Endpoint could not be reached
    #[error("exchange transport error: {0}")]
    Transport(String),

    /// Success status but no token in the body
    #[error("exchange response carried no token")]
    MissingToken,

    /// Body was not the expected JSON
    #[error("malformed exchange response: {0}")]
    Malformed(String),
}

/// Exchanges a one-time authorization code for a bearer credential
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    /// Perform the exchange
    async fn exchange(&self, code: &str) -> Result<Credential, ExchangeFailure>;
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Exchange via `GET /auth/exchange-code?code=<code>`
pub struct HttpCodeExchanger {
    client: Client,
    endpoint: Url,
}

impl HttpCodeExchanger {
    /// Exchanger that calls `endpoint` with `client`
    #[must_use]
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl CodeExchanger for HttpCodeExchanger {
    async fn exchange(&self, code: &str) -> Result<Credential, ExchangeFailure> {
        debug!(endpoint = %self.endpoint, "Sending code exchange request");

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("code", code)])
            .send()
            .await
            .map_err(|e| ExchangeFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Code exchange rejected");
            return Err(ExchangeFailure::Rejected {
                status: status.as_u16(),
            });
        }

        let body: ExchangeResponse = response
            .json()
            .await
            .map_err(|e| ExchangeFailure::Malformed(e.to_string()))?;

        match body.token {
            Some(token) if !token.is_empty() => Ok(Credential::new(token)),
            _ => Err(ExchangeFailure::MissingToken),
        }
    }
}
