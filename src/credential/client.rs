use async_trait::async_trait;
use tracing::{info, warn};

use super::messages::{ErrorResponse, TokenResponse};
use super::CredentialSource;
use crate::error::CredentialError;

/// Fallback when a failed response carries no `error` field
const GENERIC_FAILURE: &str = "Failed to get access token";

/// Fetches session credentials from the local boundary endpoint
pub struct CredentialClient {
    http: reqwest::Client,
    endpoint: String,
}

impl CredentialClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST to the endpoint (no body) and return the token
    ///
    /// A non-2xx response surfaces the endpoint's `error` message verbatim.
    pub async fn fetch_token(&self) -> Result<String, CredentialError> {
        info!("Requesting session credential from {}", self.endpoint);

        let response = self
            .http
            .post(&self.endpoint)
            .send()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| GENERIC_FAILURE.to_string());
            warn!("Credential endpoint returned {}: {}", status, message);
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        if parsed.token.is_empty() {
            return Err(CredentialError::Malformed("empty token".to_string()));
        }

        Ok(parsed.token)
    }
}

#[async_trait]
impl CredentialSource for CredentialClient {
    async fn fetch_token(&self) -> Result<String, CredentialError> {
        CredentialClient::fetch_token(self).await
    }
}
