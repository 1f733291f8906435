//! Short-lived session credentials
//!
//! `CredentialClient` talks to the boundary endpoint served by `crate::http`;
//! both sides share the JSON shapes in `messages`.

mod client;
pub mod messages;

use async_trait::async_trait;

use crate::error::CredentialError;

pub use client::CredentialClient;
pub use messages::{ErrorResponse, TokenResponse};

/// Anything that can hand out a session credential
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch_token(&self) -> Result<String, CredentialError>;
}

/// A fixed, pre-issued credential (offline runs against the loopback service)
#[derive(Debug, Clone)]
pub struct StaticCredential(pub String);

#[async_trait]
impl CredentialSource for StaticCredential {
    async fn fetch_token(&self) -> Result<String, CredentialError> {
        Ok(self.0.clone())
    }
}
