use serde::Deserialize;
use std::env;
use url::Url;

use crate::constants::{
    DEFAULT_COLLECTION_NAME, DEFAULT_FIGHTERS_API_URL, DEFAULT_HELLRAISER_CONTRACT,
    DEFAULT_SHAPE_CHAIN_ID, DEFAULT_SHAPE_RPC_URL, IPFS_GATEWAY_URL, MAX_TOKENS_PER_WALLET,
    METADATA_FETCH_CONCURRENCY, METADATA_FETCH_TIMEOUT_SECS, ONCHAIN_READ_TIMEOUT_MS,
    RATE_LIMIT_MAX_TRACKED_CLIENTS, RPC_PROXY_TIMEOUT_SECS, RPC_RATE_LIMIT_MAX_REQUESTS,
    RPC_RATE_LIMIT_WINDOW_SECS,
};
use crate::services::ownership::parse_enumeration_strategy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Redis (shared limiter counters + key-value state)
    pub redis_url: Option<String>,

    // Blockchain
    pub shape_rpc_url: String,
    pub shape_chain_id: u64,

    // Collection
    pub hellraiser_contract: String,
    pub collection_name: String,

    // External APIs
    pub fighters_api_url: String,
    pub ipfs_gateway_url: String,

    // Metadata resolution
    pub metadata_fetch_timeout_secs: u64,
    pub metadata_fetch_concurrency: usize,
    pub onchain_read_timeout_ms: u64,
    pub max_tokens_per_wallet: usize,
    pub enumeration_strategy: String,

    // RPC guard
    pub rpc_rate_limit_enabled: bool,
    pub rpc_rate_limit_window_secs: u64,
    pub rpc_rate_limit_max_requests: u32,
    pub rate_limit_max_tracked_clients: usize,
    pub rpc_proxy_timeout_secs: u64,

    // CORS
    pub cors_allowed_origins: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "production".to_string(),
            redis_url: None,
            shape_rpc_url: DEFAULT_SHAPE_RPC_URL.to_string(),
            shape_chain_id: DEFAULT_SHAPE_CHAIN_ID,
            hellraiser_contract: DEFAULT_HELLRAISER_CONTRACT.to_string(),
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            fighters_api_url: DEFAULT_FIGHTERS_API_URL.to_string(),
            ipfs_gateway_url: IPFS_GATEWAY_URL.to_string(),
            metadata_fetch_timeout_secs: METADATA_FETCH_TIMEOUT_SECS,
            metadata_fetch_concurrency: METADATA_FETCH_CONCURRENCY,
            onchain_read_timeout_ms: ONCHAIN_READ_TIMEOUT_MS,
            max_tokens_per_wallet: MAX_TOKENS_PER_WALLET,
            enumeration_strategy: "owner_index".to_string(),
            rpc_rate_limit_enabled: true,
            rpc_rate_limit_window_secs: RPC_RATE_LIMIT_WINDOW_SECS,
            rpc_rate_limit_max_requests: RPC_RATE_LIMIT_MAX_REQUESTS,
            rate_limit_max_tracked_clients: RATE_LIMIT_MAX_TRACKED_CLIENTS,
            rpc_proxy_timeout_secs: RPC_PROXY_TIMEOUT_SECS,
            cors_allowed_origins: "*".to_string(),
        }
    }
}

// Internal helper that reads an optional, non-blank environment value.
fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Internal helper that parses boolean-ish flags (`1`, `true`, `yes`, `on`).
fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        let environment = env_opt("ENVIRONMENT").unwrap_or(defaults.environment);
        let is_development = environment.eq_ignore_ascii_case("development");

        Ok(Config {
            host: env_opt("HOST").unwrap_or(defaults.host),
            port: env_opt("PORT")
                .unwrap_or_else(|| defaults.port.to_string())
                .parse()?,
            environment,

            redis_url: env_opt("REDIS_URL"),

            shape_rpc_url: env_opt("SHAPE_RPC_URL").unwrap_or(defaults.shape_rpc_url),
            shape_chain_id: env_opt("SHAPE_CHAIN_ID")
                .unwrap_or_else(|| defaults.shape_chain_id.to_string())
                .parse()?,

            hellraiser_contract: env_opt("HELLRAISER_CONTRACT")
                .unwrap_or(defaults.hellraiser_contract),
            collection_name: env_opt("HELLRAISER_COLLECTION_NAME")
                .unwrap_or(defaults.collection_name),

            // An explicitly empty value disables the external inventory source.
            fighters_api_url: env::var("FIGHTERS_API_URL")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.fighters_api_url),
            ipfs_gateway_url: env_opt("IPFS_GATEWAY_URL").unwrap_or(defaults.ipfs_gateway_url),

            metadata_fetch_timeout_secs: env_opt("METADATA_FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|| defaults.metadata_fetch_timeout_secs.to_string())
                .parse()?,
            metadata_fetch_concurrency: env_opt("METADATA_FETCH_CONCURRENCY")
                .unwrap_or_else(|| defaults.metadata_fetch_concurrency.to_string())
                .parse()?,
            onchain_read_timeout_ms: env_opt("ONCHAIN_READ_TIMEOUT_MS")
                .unwrap_or_else(|| defaults.onchain_read_timeout_ms.to_string())
                .parse()?,
            max_tokens_per_wallet: env_opt("MAX_TOKENS_PER_WALLET")
                .unwrap_or_else(|| defaults.max_tokens_per_wallet.to_string())
                .parse()?,
            enumeration_strategy: env_opt("ENUMERATION_STRATEGY")
                .unwrap_or(defaults.enumeration_strategy),

            rpc_rate_limit_enabled: env_flag("RPC_RATE_LIMIT_ENABLED", !is_development),
            rpc_rate_limit_window_secs: env_opt("RPC_RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|| defaults.rpc_rate_limit_window_secs.to_string())
                .parse()?,
            rpc_rate_limit_max_requests: env_opt("RPC_RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or_else(|| defaults.rpc_rate_limit_max_requests.to_string())
                .parse()?,
            rate_limit_max_tracked_clients: env_opt("RATE_LIMIT_MAX_TRACKED_CLIENTS")
                .unwrap_or_else(|| defaults.rate_limit_max_tracked_clients.to_string())
                .parse()?,
            rpc_proxy_timeout_secs: env_opt("RPC_PROXY_TIMEOUT_SECS")
                .unwrap_or_else(|| defaults.rpc_proxy_timeout_secs.to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        Url::parse(self.upstream_rpc_url())
            .map_err(|e| anyhow::anyhow!("SHAPE_RPC_URL is invalid: {}", e))?;
        if !self.fighters_api_url.is_empty() {
            Url::parse(&self.fighters_api_url)
                .map_err(|e| anyhow::anyhow!("FIGHTERS_API_URL is invalid: {}", e))?;
        }
        parse_enumeration_strategy(Some(&self.enumeration_strategy))
            .map_err(|e| anyhow::anyhow!("ENUMERATION_STRATEGY: {}", e))?;

        if self.rpc_rate_limit_window_secs == 0 {
            anyhow::bail!("RPC_RATE_LIMIT_WINDOW_SECS must be > 0");
        }
        if self.rpc_rate_limit_max_requests == 0 {
            tracing::warn!("RPC_RATE_LIMIT_MAX_REQUESTS is 0; treating it as 1");
        }
        if self.rpc_proxy_timeout_secs == 0 {
            anyhow::bail!("RPC_PROXY_TIMEOUT_SECS must be > 0");
        }
        if !self.rpc_rate_limit_enabled && !self.is_development() {
            tracing::warn!("RPC rate limiting disabled (environment={})", self.environment);
        }

        if !self.has_collection_contract() {
            tracing::warn!(
                "HELLRAISER_CONTRACT is missing or placeholder; on-chain ownership resolution disabled"
            );
        }
        if self.metadata_fetch_concurrency == 0 {
            tracing::warn!("METADATA_FETCH_CONCURRENCY is 0; falling back to 1");
        }
        if self.redis_url.is_none() {
            tracing::warn!("REDIS_URL not set; limiter counters and user state are process-local");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    /// Upstream JSON-RPC endpoint with any trailing slash removed.
    pub fn upstream_rpc_url(&self) -> &str {
        self.shape_rpc_url.trim().trim_end_matches('/')
    }

    pub fn has_collection_contract(&self) -> bool {
        let contract = self.hellraiser_contract.trim();
        contract.starts_with("0x") && contract.len() == 42 && !contract.starts_with("0x0000")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_shape_mainnet() {
        let config = Config::default();
        assert_eq!(config.shape_chain_id, 360);
        assert_eq!(config.rpc_rate_limit_window_secs, 60);
        assert_eq!(config.rpc_rate_limit_max_requests, 200);
        assert!(config.has_collection_contract());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn upstream_url_drops_trailing_slash() {
        let config = Config {
            shape_rpc_url: "https://mainnet.shape.network/".to_string(),
            ..Config::default()
        };
        assert_eq!(config.upstream_rpc_url(), "https://mainnet.shape.network");
    }

    #[test]
    fn placeholder_contract_is_not_usable() {
        let config = Config {
            hellraiser_contract: "0x0000000000000000000000000000000000000000".to_string(),
            ..Config::default()
        };
        assert!(!config.has_collection_contract());
    }

    #[test]
    fn development_environment_matches_any_case() {
        let config = Config {
            environment: "Development".to_string(),
            rpc_rate_limit_enabled: false,
            ..Config::default()
        };
        assert!(config.is_development());
        assert!(config.validate().is_ok());
        assert!(!Config::default().is_development());
    }

    #[test]
    fn validate_rejects_zero_proxy_timeout() {
        let config = Config {
            rpc_proxy_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(Config::default().rpc_proxy_timeout_secs, 30);
    }

    #[test]
    fn validate_rejects_unknown_strategy() {
        let config = Config {
            enumeration_strategy: "brute_force".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
