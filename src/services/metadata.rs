use base64::{engine::general_purpose::STANDARD, Engine};
use percent_encoding::percent_decode_str;
use reqwest::{header::ACCEPT, Client};
use serde_json::Value;
use tokio::time::{timeout, Duration};

use crate::{
    constants::{ARWEAVE_GATEWAY_URL, IPFS_GATEWAY_URL},
    error::{AppError, Result},
    models::NftMetadata,
};

/// HTTP gateways used to turn content-addressed and archival URIs into fetchable URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gateways {
    pub ipfs: String,
    pub arweave: String,
}

impl Default for Gateways {
    fn default() -> Self {
        Self {
            ipfs: IPFS_GATEWAY_URL.to_string(),
            arweave: ARWEAVE_GATEWAY_URL.to_string(),
        }
    }
}

impl Gateways {
    pub fn with_ipfs(ipfs: &str) -> Self {
        let trimmed = ipfs.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        Self {
            ipfs: format!("{}/", trimmed.trim_end_matches('/')),
            ..Self::default()
        }
    }
}

/// `ipfs://<hash>/<path>` -> `<gateway>/<hash>/<path>`; anything else is returned as is.
pub fn convert_ipfs_to_http(uri: &str, gateways: &Gateways) -> String {
    match uri.strip_prefix("ipfs://") {
        Some(path) => format!("{}{}", gateways.ipfs, path.trim_start_matches('/')),
        None => uri.to_string(),
    }
}

pub fn convert_arweave_to_http(uri: &str, gateways: &Gateways) -> String {
    match uri.strip_prefix("ar://") {
        Some(id) => format!("{}{}", gateways.arweave, id),
        None => uri.to_string(),
    }
}

/// Rewrites a metadata pointer into something fetchable. Data URIs and
/// http(s) URLs pass through untouched.
pub fn normalize_token_uri(uri: &str, gateways: &Gateways) -> String {
    let uri = uri.trim();
    if uri.starts_with("ipfs://") {
        return convert_ipfs_to_http(uri, gateways);
    }
    if uri.starts_with("ar://") {
        return convert_arweave_to_http(uri, gateways);
    }
    uri.to_string()
}

/// Decodes an inline `data:` JSON document (base64 or percent-encoded).
pub fn decode_data_uri(uri: &str) -> Result<Value> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AppError::BadRequest("not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::BadRequest("data URI has no payload".to_string()))?;
    let header = header.to_ascii_lowercase();

    if !header.starts_with("application/json") && !header.starts_with("text/plain") {
        return Err(AppError::BadRequest(format!(
            "unsupported data URI media type: {}",
            header
        )));
    }

    let text = if header.split(';').any(|part| part.trim() == "base64") {
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| AppError::BadRequest(format!("invalid base64 payload: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::BadRequest(format!("payload is not utf-8: {}", e)))?
    } else {
        percent_decode_str(payload)
            .decode_utf8()
            .map_err(|e| AppError::BadRequest(format!("payload is not utf-8: {}", e)))?
            .into_owned()
    };

    Ok(serde_json::from_str(&text)?)
}

#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// Resolves a token's metadata document. Every failure collapses to `None`.
    async fn fetch(&self, token_uri: &str) -> Option<NftMetadata>;
}

pub struct MetadataFetcher {
    client: Client,
    timeout: Duration,
    gateways: Gateways,
}

impl MetadataFetcher {
    pub fn new(client: Client, timeout: Duration, gateways: Gateways) -> Self {
        Self {
            client,
            timeout,
            gateways,
        }
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ExternalAPI(format!(
                "metadata host returned {}",
                status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("invalid metadata body: {}", e)))
    }
}

#[async_trait::async_trait]
impl MetadataSource for MetadataFetcher {
    async fn fetch(&self, token_uri: &str) -> Option<NftMetadata> {
        let token_uri = token_uri.trim();
        if token_uri.is_empty() {
            return None;
        }
        let normalized = normalize_token_uri(token_uri, &self.gateways);

        let document = if normalized.starts_with("data:") {
            match decode_data_uri(&normalized) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!("metadata_inline_decode failed err={}", err);
                    return None;
                }
            }
        } else if normalized.starts_with("http://") || normalized.starts_with("https://") {
            match timeout(self.timeout, self.fetch_json(&normalized)).await {
                Ok(Ok(value)) => value,
                Ok(Err(err)) => {
                    tracing::warn!("metadata_fetch failed uri={} err={}", normalized, err);
                    return None;
                }
                Err(_) => {
                    tracing::warn!(
                        "metadata_fetch timeout uri={} after={}ms",
                        normalized,
                        self.timeout.as_millis()
                    );
                    return None;
                }
            }
        } else {
            tracing::warn!("metadata_fetch unsupported uri scheme uri={}", normalized);
            return None;
        };

        let metadata = NftMetadata::from_json(document);
        if metadata.is_none() {
            tracing::warn!("metadata_parse not a JSON object uri={}", token_uri);
        }
        metadata
    }
}
