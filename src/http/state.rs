use std::sync::Arc;

use crate::config::CredentialConfig;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Server-side API secret; `None` when the environment variable is unset
    pub secret: Option<Arc<str>>,

    /// Name of the environment variable the secret is read from
    pub secret_name: Arc<str>,

    /// Upstream token-creation URL
    pub upstream_url: Arc<str>,

    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(secret: Option<String>, secret_name: &str, upstream_url: &str) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(Arc::from),
            secret_name: Arc::from(secret_name),
            upstream_url: Arc::from(upstream_url),
            client: reqwest::Client::new(),
        }
    }

    /// Read the secret from the environment variable named in the config
    pub fn from_env(config: &CredentialConfig) -> Self {
        let secret = std::env::var(&config.secret_env).ok();
        Self::new(secret, &config.secret_env, &config.upstream_url)
    }
}
