// All service modules
pub mod display;
pub mod kv_store;
pub mod leaderboard;
pub mod metadata;
pub mod onchain;
pub mod ownership;
pub mod profile_store;
pub mod rate_limiter;
pub mod rpc_forwarder;
pub mod training;

#[cfg(test)]
pub mod test_support;

// Re-export for convenience
pub use kv_store::{KvStore, MemoryKvStore, RedisKvStore};
pub use metadata::MetadataFetcher;
pub use onchain::Erc721Reader;
pub use ownership::{OwnershipResolver, ResolutionEpochs};
pub use profile_store::ProfileStore;
pub use rate_limiter::{CounterBackend, FixedWindowLimiter, MemoryCounterBackend, RedisCounterBackend};
pub use rpc_forwarder::{ForwardError, RpcForwarder};
pub use training::TrainingStore;
