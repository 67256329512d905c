// src/api/mod.rs

pub mod health;
pub mod leaderboard;
pub mod nft;
pub mod profile;
pub mod rpc;
pub mod training;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    FixedWindowLimiter, OwnershipResolver, ProfileStore, ResolutionEpochs, RpcForwarder,
    TrainingStore,
};
use crate::utils::{normalize_wallet, parse_wallet_address};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub resolver: Arc<OwnershipResolver>,
    pub epochs: ResolutionEpochs,
    pub limiter: FixedWindowLimiter,
    pub forwarder: RpcForwarder,
    pub profiles: ProfileStore,
    pub training: TrainingStore,
    pub kv_backend: &'static str,
}

/// Validates a wallet path segment and returns its lowercased form.
pub fn wallet_param(raw: &str) -> Result<String> {
    let address = parse_wallet_address(raw)?;
    Ok(normalize_wallet(&address))
}

#[cfg(test)]
pub(crate) mod test_state {
    use super::*;
    use crate::services::{
        metadata::Gateways, MemoryCounterBackend, MemoryKvStore, MetadataFetcher,
    };
    use reqwest::Client;
    use std::time::Duration;

    /// State backed by in-memory stores, with no on-chain reader or external inventory.
    pub fn build(upstream_url: &str, limit: u32) -> AppState {
        let config = Config {
            shape_rpc_url: upstream_url.to_string(),
            rpc_rate_limit_max_requests: limit,
            ..Config::default()
        };
        let client = Client::new();
        let metadata = Arc::new(MetadataFetcher::new(
            client.clone(),
            Duration::from_secs(1),
            Gateways::default(),
        ));
        let kv = Arc::new(MemoryKvStore::new());
        AppState {
            resolver: Arc::new(OwnershipResolver::new(metadata, &config.collection_name)),
            epochs: ResolutionEpochs::new(),
            limiter: FixedWindowLimiter::from_config(
                &config,
                Arc::new(MemoryCounterBackend::default()),
            ),
            forwarder: RpcForwarder::from_config(client, &config),
            profiles: ProfileStore::new(kv.clone()),
            training: TrainingStore::new(kv),
            kv_backend: "memory",
            config,
        }
    }
}
