use std::{fmt::Display, future::Future, str::FromStr, sync::Arc};

use ethers::{
    providers::{Http, Middleware, Provider},
    types::{Address, U256},
};
use tokio::time::{timeout, Duration};

use crate::{
    config::Config,
    error::{AppError, Result},
};

ethers::contract::abigen!(
    Erc721,
    r#"[
        function balanceOf(address) view returns (uint256)
        function tokenOfOwnerByIndex(address, uint256) view returns (uint256)
        function tokenURI(uint256) view returns (string)
        function totalSupply() view returns (uint256)
        function ownerOf(uint256) view returns (address)
    ]"#
);

/// Read-only view of one ERC-721 collection.
#[async_trait::async_trait]
pub trait CollectionReader: Send + Sync {
    async fn balance_of(&self, owner: Address) -> Result<U256>;
    async fn token_of_owner_by_index(&self, owner: Address, index: U256) -> Result<U256>;
    async fn token_uri(&self, token_id: U256) -> Result<String>;
    async fn total_supply(&self) -> Result<U256>;
    async fn owner_of(&self, token_id: U256) -> Result<Address>;
}

pub struct Erc721Reader {
    provider: Arc<Provider<Http>>,
    contract: Erc721<Provider<Http>>,
    read_timeout: Duration,
}

impl Erc721Reader {
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.upstream_rpc_url())
            .map_err(|e| AppError::Internal(format!("Invalid Shape RPC URL: {}", e)))?;
        let provider = Arc::new(provider);
        let address = Address::from_str(config.hellraiser_contract.trim())
            .map_err(|_| AppError::Internal("Invalid HELLRAISER_CONTRACT address".to_string()))?;

        Ok(Self {
            contract: Erc721::new(address, provider.clone()),
            provider,
            read_timeout: Duration::from_millis(config.onchain_read_timeout_ms.max(1)),
        })
    }

    pub fn contract_address(&self) -> Address {
        self.contract.address()
    }

    /// Compares the node's chain id with the configured one. A mismatch is
    /// only reported; reads keep going against whatever the node serves.
    pub async fn verify_chain_id(&self, expected: u64) -> Result<bool> {
        let chain_id = self
            .bounded("eth_chainId", self.provider.get_chainid())
            .await?;
        let matches = chain_id == U256::from(expected);
        if !matches {
            tracing::warn!(
                "Shape RPC chain id mismatch expected={} actual={}",
                expected,
                chain_id
            );
        }
        Ok(matches)
    }

    // Applies the per-call read timeout and folds every failure into a BlockchainRPC error.
    async fn bounded<T, E, F>(&self, label: &str, fut: F) -> Result<T>
    where
        E: Display,
        F: Future<Output = std::result::Result<T, E>>,
    {
        match timeout(self.read_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(AppError::BlockchainRPC(format!("{}: {}", label, err))),
            Err(_) => Err(AppError::BlockchainRPC(format!(
                "{} timed out after {}ms",
                label,
                self.read_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl CollectionReader for Erc721Reader {
    async fn balance_of(&self, owner: Address) -> Result<U256> {
        let call = self.contract.balance_of(owner);
        self.bounded("balanceOf", call.call()).await
    }

    async fn token_of_owner_by_index(&self, owner: Address, index: U256) -> Result<U256> {
        let call = self.contract.token_of_owner_by_index(owner, index);
        self.bounded("tokenOfOwnerByIndex", call.call()).await
    }

    async fn token_uri(&self, token_id: U256) -> Result<String> {
        let call = self.contract.token_uri(token_id);
        self.bounded("tokenURI", call.call()).await
    }

    async fn total_supply(&self) -> Result<U256> {
        let call = self.contract.total_supply();
        self.bounded("totalSupply", call.call()).await
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address> {
        let call = self.contract.owner_of(token_id);
        self.bounded("ownerOf", call.call()).await
    }
}
