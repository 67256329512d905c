use reqwest::{
    header::{ACCEPT, CONTENT_TYPE, USER_AGENT},
    Client, StatusCode,
};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::{
    config::Config,
    constants::{RPC_PROXY_TIMEOUT_SECS, RPC_PROXY_USER_AGENT},
};

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("{0}")]
    Transport(String),

    #[error("upstream returned 403 Forbidden")]
    Forbidden { details: String },

    #[error("upstream returned {status} {status_text}")]
    UpstreamStatus {
        status: StatusCode,
        status_text: String,
        details: String,
    },

    #[error("upstream response is not JSON: {0}")]
    InvalidResponse(String),
}

/// Relays JSON-RPC payloads to the configured upstream node unchanged.
///
/// Every call carries the forwarder's own timeout, which takes precedence
/// over any timeout set on the shared client.
#[derive(Clone, Debug)]
pub struct RpcForwarder {
    client: Client,
    upstream_url: String,
    timeout: Duration,
}

impl RpcForwarder {
    pub fn new(client: Client, upstream_url: &str) -> Self {
        Self {
            client,
            upstream_url: upstream_url.trim().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(RPC_PROXY_TIMEOUT_SECS),
        }
    }

    pub fn from_config(client: Client, config: &Config) -> Self {
        Self::new(client, config.upstream_rpc_url())
            .with_timeout(Duration::from_secs(config.rpc_proxy_timeout_secs.max(1)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    pub async fn forward(&self, body: &Value) -> Result<Value, ForwardError> {
        let response = self
            .client
            .post(&self.upstream_url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, RPC_PROXY_USER_AGENT)
            .json(body)
            .send()
            .await
            .map_err(|e| ForwardError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let status_text = status.canonical_reason().unwrap_or_default().to_string();
            let details = match response.text().await {
                Ok(text) => text,
                Err(_) => status_text.clone(),
            };
            tracing::error!(
                "rpc upstream rejected url={} status={} details={}",
                self.upstream_url,
                status,
                details
            );
            if status == StatusCode::FORBIDDEN {
                return Err(ForwardError::Forbidden { details });
            }
            return Err(ForwardError::UpstreamStatus {
                status,
                status_text,
                details,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ForwardError::InvalidResponse(e.to_string()))
    }
}
