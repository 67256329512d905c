use std::{collections::HashMap, collections::HashSet, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use ethers::types::{Address, U256};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{RwLock, Semaphore};

use crate::{
    constants::{
        MAX_TOKENS_PER_WALLET, MAX_TRACKED_SESSIONS, METADATA_FETCH_CONCURRENCY,
        OWNER_PROBE_BATCH_SIZE, SESSION_IDLE_TTL_SECS,
    },
    error::{AppError, Result},
    integrations::fighters_api::InventorySource,
    models::{CollectionItem, CollectionSource, ResolvedCollection},
    services::{
        display::extract_display_data,
        metadata::{Gateways, MetadataSource},
        onchain::CollectionReader,
    },
    utils::normalize_wallet,
};

/// How owned token ids are discovered on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationStrategy {
    /// ERC-721 Enumerable `tokenOfOwnerByIndex`.
    OwnerIndex,
    /// `ownerOf` scan over `0..=totalSupply`, for collections without the enumerable extension.
    OwnerProbe,
}

pub fn parse_enumeration_strategy(raw: Option<&str>) -> Result<EnumerationStrategy> {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("owner_index") => Ok(EnumerationStrategy::OwnerIndex),
        Some("owner_probe") => Ok(EnumerationStrategy::OwnerProbe),
        Some(other) => Err(AppError::BadRequest(format!(
            "unknown enumeration strategy '{}' (expected owner_index or owner_probe)",
            other
        ))),
    }
}

pub struct OwnershipResolver {
    reader: Option<Arc<dyn CollectionReader>>,
    metadata: Arc<dyn MetadataSource>,
    inventory: Option<Arc<dyn InventorySource>>,
    collection_name: String,
    strategy: EnumerationStrategy,
    concurrency: usize,
    max_tokens: usize,
    gateways: Gateways,
}

impl OwnershipResolver {
    pub fn new(metadata: Arc<dyn MetadataSource>, collection_name: &str) -> Self {
        Self {
            reader: None,
            metadata,
            inventory: None,
            collection_name: collection_name.to_string(),
            strategy: EnumerationStrategy::OwnerIndex,
            concurrency: METADATA_FETCH_CONCURRENCY,
            max_tokens: MAX_TOKENS_PER_WALLET,
            gateways: Gateways::default(),
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn CollectionReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_inventory(mut self, inventory: Arc<dyn InventorySource>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn with_strategy(mut self, strategy: EnumerationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// In-flight contract reads and metadata fetches allowed for one
    /// `resolve` call. Concurrent calls do not share the allowance.
    pub fn with_concurrency(mut self, permits: usize) -> Self {
        self.concurrency = permits.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    pub fn with_gateways(mut self, gateways: Gateways) -> Self {
        self.gateways = gateways;
        self
    }

    pub fn strategy(&self) -> EnumerationStrategy {
        self.strategy
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Collection items owned by `owner`. Never fails: every error degrades to
    /// an empty or placeholder result and is logged.
    pub async fn resolve(&self, owner: Option<Address>) -> ResolvedCollection {
        let Some(owner) = owner else {
            return ResolvedCollection::empty();
        };
        let wallet = normalize_wallet(&owner);

        let (external, onchain) =
            tokio::join!(self.fetch_external(&wallet), self.resolve_onchain(owner));

        match external {
            Some(items) if !items.is_empty() => {
                tracing::info!(
                    "ownership resolved from external inventory wallet={} items={} onchain_items={}",
                    wallet,
                    items.len(),
                    onchain.items.len()
                );
                ResolvedCollection {
                    source: CollectionSource::ExternalAuthoritative,
                    balance: items.len() as u64,
                    token_ids: items.iter().map(|item| item.token_id.clone()).collect(),
                    items,
                }
            }
            _ => {
                tracing::info!(
                    "ownership resolved on-chain wallet={} balance={} items={}",
                    wallet,
                    onchain.balance,
                    onchain.items.len()
                );
                onchain
            }
        }
    }

    async fn fetch_external(&self, wallet: &str) -> Option<Vec<CollectionItem>> {
        let inventory = self.inventory.as_ref()?;
        match inventory.fighters_by_owner(wallet).await {
            Ok(items) => Some(items),
            Err(err) => {
                tracing::warn!("external inventory unavailable wallet={} err={}", wallet, err);
                None
            }
        }
    }

    async fn resolve_onchain(&self, owner: Address) -> ResolvedCollection {
        let Some(reader) = self.reader.as_deref() else {
            return ResolvedCollection::empty();
        };

        let balance = match reader.balance_of(owner).await {
            Ok(balance) => balance,
            Err(err) => {
                tracing::warn!("balanceOf failed owner={:?} err={}", owner, err);
                return ResolvedCollection::empty();
            }
        };
        if balance.is_zero() {
            return ResolvedCollection::empty();
        }

        let balance_u64 = if balance > U256::from(u64::MAX) {
            u64::MAX
        } else {
            balance.as_u64()
        };
        let mut wanted = usize::try_from(balance_u64).unwrap_or(usize::MAX);
        if wanted > self.max_tokens {
            tracing::warn!(
                "enumeration capped owner={:?} balance={} cap={}",
                owner,
                balance_u64,
                self.max_tokens
            );
            wanted = self.max_tokens;
        }

        let permits = Semaphore::new(self.concurrency);
        let ids = match self.strategy {
            EnumerationStrategy::OwnerIndex => {
                self.enumerate_by_index(reader, &permits, owner, wanted).await
            }
            EnumerationStrategy::OwnerProbe => {
                self.enumerate_by_probe(reader, &permits, owner, wanted).await
            }
        };
        let ids = dedupe_token_ids(ids);

        if (ids.len() as u64) < balance_u64 {
            tracing::warn!(
                "enumerated fewer tokens than balance owner={:?} balance={} enumerated={}",
                owner,
                balance_u64,
                ids.len()
            );
        }

        let items = self.resolve_items(reader, &permits, &ids).await;
        ResolvedCollection {
            source: CollectionSource::OnChainOnly,
            balance: balance_u64,
            token_ids: ids.iter().map(U256::to_string).collect(),
            items,
        }
    }

    async fn enumerate_by_index(
        &self,
        reader: &dyn CollectionReader,
        permits: &Semaphore,
        owner: Address,
        wanted: usize,
    ) -> Vec<U256> {
        let lookups = (0..wanted).map(|index| async move {
            let _permit = permits.acquire().await.ok();
            (index, reader.token_of_owner_by_index(owner, U256::from(index)).await)
        });

        let mut ids = Vec::with_capacity(wanted);
        let mut failures = 0usize;
        for (index, outcome) in join_all(lookups).await {
            match outcome {
                Ok(id) => ids.push(id),
                Err(err) => {
                    failures += 1;
                    tracing::warn!(
                        "tokenOfOwnerByIndex failed owner={:?} index={} err={}",
                        owner,
                        index,
                        err
                    );
                }
            }
        }

        if wanted > 0 && failures == wanted {
            tracing::warn!(
                "every tokenOfOwnerByIndex lookup failed owner={:?}; collection may not implement ERC721Enumerable",
                owner
            );
        }
        ids
    }

    async fn enumerate_by_probe(
        &self,
        reader: &dyn CollectionReader,
        permits: &Semaphore,
        owner: Address,
        wanted: usize,
    ) -> Vec<U256> {
        let total_supply = match reader.total_supply().await {
            Ok(total) => total,
            Err(err) => {
                tracing::warn!("totalSupply failed; owner probe aborted err={}", err);
                return Vec::new();
            }
        };
        let last_id = if total_supply > U256::from(u64::MAX) {
            u64::MAX
        } else {
            total_supply.as_u64()
        };

        let mut found = Vec::new();
        let mut next = 0u64;
        while next <= last_id && found.len() < wanted {
            let batch_end = next
                .saturating_add(OWNER_PROBE_BATCH_SIZE as u64 - 1)
                .min(last_id);
            let probes = (next..=batch_end).map(|id| async move {
                let _permit = permits.acquire().await.ok();
                (id, reader.owner_of(U256::from(id)).await)
            });
            for (id, outcome) in join_all(probes).await {
                match outcome {
                    Ok(holder) if holder == owner && found.len() < wanted => {
                        found.push(U256::from(id))
                    }
                    Ok(_) => {}
                    Err(err) => tracing::debug!("ownerOf probe skipped id={} err={}", id, err),
                }
            }
            if batch_end == u64::MAX {
                break;
            }
            next = batch_end + 1;
        }

        tracing::debug!(
            "owner probe finished owner={:?} total_supply={} found={}",
            owner,
            last_id,
            found.len()
        );
        found
    }

    async fn resolve_items(
        &self,
        reader: &dyn CollectionReader,
        permits: &Semaphore,
        ids: &[U256],
    ) -> Vec<CollectionItem> {
        let tasks = ids.iter().map(|id| async move {
            let _permit = permits.acquire().await.ok();
            let token_id = id.to_string();
            let metadata = match reader.token_uri(*id).await {
                Ok(uri) => self.metadata.fetch(&uri).await,
                Err(err) => {
                    tracing::warn!("tokenURI failed token_id={} err={}", token_id, err);
                    None
                }
            };
            extract_display_data(
                metadata.as_ref(),
                &token_id,
                &self.collection_name,
                &self.gateways,
            )
        });
        join_all(tasks).await
    }
}

// First occurrence wins.
fn dedupe_token_ids(ids: Vec<U256>) -> Vec<U256> {
    let mut seen = HashSet::with_capacity(ids.len());
    let total = ids.len();
    let unique: Vec<U256> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
    if unique.len() != total {
        tracing::warn!(
            "duplicate token ids dropped total={} unique={}",
            total,
            unique.len()
        );
    }
    unique
}

// ==================== RESOLUTION EPOCHS ====================

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub generation: u64,
    pub wallet: Option<String>,
    pub collection: ResolvedCollection,
    pub resolved_at: DateTime<Utc>,
}

struct SessionSlot {
    latest_generation: u64,
    touched_at: DateTime<Utc>,
    view: Option<SessionView>,
}

/// Generation counter per viewer session. Only the newest resolution started
/// for a session may replace its committed view.
///
/// At most `max_sessions` slots are kept. When a new session arrives at the
/// cap, slots idle for longer than the TTL are swept, then the least recently
/// started one is evicted if the table is still full.
#[derive(Clone)]
pub struct ResolutionEpochs {
    sessions: Arc<RwLock<HashMap<String, SessionSlot>>>,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl Default for ResolutionEpochs {
    fn default() -> Self {
        Self::with_limits(MAX_TRACKED_SESSIONS, SESSION_IDLE_TTL_SECS)
    }
}

impl ResolutionEpochs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_sessions: usize, idle_ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions: max_sessions.max(1),
            idle_ttl: i64::try_from(idle_ttl_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    pub async fn tracked_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn begin(&self, session: &str) -> u64 {
        self.begin_at(session, Utc::now()).await
    }

    pub async fn begin_at(&self, session: &str, now: DateTime<Utc>) -> u64 {
        let mut sessions = self.sessions.write().await;

        if !sessions.contains_key(session) && sessions.len() >= self.max_sessions {
            let before = sessions.len();
            let idle_ttl = self.idle_ttl;
            sessions.retain(|_, slot| now - slot.touched_at < idle_ttl);
            if sessions.len() >= self.max_sessions {
                let oldest = sessions
                    .iter()
                    .min_by_key(|(_, slot)| slot.touched_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    sessions.remove(&oldest);
                }
            }
            tracing::debug!(
                "session sweep removed={} remaining={}",
                before - sessions.len(),
                sessions.len()
            );
        }

        let slot = sessions
            .entry(session.to_string())
            .or_insert_with(|| SessionSlot {
                latest_generation: 0,
                touched_at: now,
                view: None,
            });
        slot.latest_generation += 1;
        slot.touched_at = now;
        slot.latest_generation
    }

    /// Stores the view if `generation` is still current. Returns `false` for a
    /// stale completion, which is discarded, and for a session evicted while
    /// its resolution was in flight.
    pub async fn commit(
        &self,
        session: &str,
        generation: u64,
        wallet: Option<String>,
        collection: ResolvedCollection,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(slot) = sessions.get_mut(session) else {
            tracing::debug!("resolution for evicted session discarded session={}", session);
            return false;
        };
        if generation != slot.latest_generation {
            tracing::debug!(
                "stale resolution discarded session={} generation={} latest={}",
                session,
                generation,
                slot.latest_generation
            );
            return false;
        }
        slot.view = Some(SessionView {
            generation,
            wallet,
            collection,
            resolved_at: Utc::now(),
        });
        true
    }

    pub async fn current(&self, session: &str) -> Option<SessionView> {
        let sessions = self.sessions.read().await;
        sessions.get(session).and_then(|slot| slot.view.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NftMetadata;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockReader {
        balance: u64,
        owned: Vec<u64>,
        failing_indexes: Vec<u64>,
        total_supply: u64,
        index_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl CollectionReader for MockReader {
        async fn balance_of(&self, _owner: Address) -> Result<U256> {
            Ok(U256::from(self.balance))
        }

        async fn token_of_owner_by_index(&self, _owner: Address, index: U256) -> Result<U256> {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            let index = index.as_u64();
            if self.failing_indexes.contains(&index) {
                return Err(AppError::BlockchainRPC("execution reverted".to_string()));
            }
            self.owned
                .get(index as usize)
                .map(|id| U256::from(*id))
                .ok_or_else(|| AppError::BlockchainRPC("index out of bounds".to_string()))
        }

        async fn token_uri(&self, token_id: U256) -> Result<String> {
            Ok(format!("mock://{}", token_id))
        }

        async fn total_supply(&self) -> Result<U256> {
            Ok(U256::from(self.total_supply))
        }

        async fn owner_of(&self, token_id: U256) -> Result<Address> {
            if self.owned.contains(&token_id.as_u64()) {
                Ok(owner())
            } else {
                Ok(Address::repeat_byte(0x22))
            }
        }
    }

    #[derive(Default)]
    struct MockMetadata {
        missing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl MetadataSource for MockMetadata {
        async fn fetch(&self, token_uri: &str) -> Option<NftMetadata> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(token_uri.to_string());
            let id = token_uri.trim_start_matches("mock://");
            if self.missing.iter().any(|m| m == id) {
                return None;
            }
            NftMetadata::from_json(json!({
                "name": format!("Hellraiser #{}", id),
                "image": format!("ipfs://QmFighter/{}.png", id),
                "attributes": [{"trait_type": "Level", "value": 3}]
            }))
        }
    }

    struct MockInventory {
        items: Vec<CollectionItem>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl InventorySource for MockInventory {
        async fn fighters_by_owner(&self, _wallet: &str) -> Result<Vec<CollectionItem>> {
            if self.fail {
                return Err(AppError::ExternalAPI("down".to_string()));
            }
            Ok(self.items.clone())
        }
    }

    fn owner() -> Address {
        Address::repeat_byte(0x11)
    }

    fn resolver(reader: MockReader, metadata: Arc<MockMetadata>) -> OwnershipResolver {
        OwnershipResolver::new(metadata, "Hellraiser").with_reader(Arc::new(reader))
    }

    fn external_item(id: &str) -> CollectionItem {
        crate::services::display::extract_display_data(None, id, "Hellraiser", &Gateways::default())
    }

    #[tokio::test]
    async fn disconnected_wallet_resolves_to_nothing() {
        let metadata = Arc::new(MockMetadata::default());
        let result = resolver(MockReader::default(), metadata.clone())
            .resolve(None)
            .await;
        assert!(result.items.is_empty());
        assert!(metadata.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn zero_balance_skips_enumeration_and_metadata() {
        let metadata = Arc::new(MockMetadata::default());
        let reader = MockReader::default();
        let resolver = resolver(reader, metadata.clone());
        let result = resolver.resolve(Some(owner())).await;

        assert_eq!(result.balance, 0);
        assert!(result.items.is_empty());
        assert!(metadata.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn failed_metadata_keeps_order_and_placeholders() {
        let metadata = Arc::new(MockMetadata {
            missing: vec!["7".to_string()],
            ..MockMetadata::default()
        });
        let reader = MockReader {
            balance: 3,
            owned: vec![3, 7, 12],
            ..MockReader::default()
        };
        let result = resolver(reader, metadata).with_concurrency(2).resolve(Some(owner())).await;

        assert_eq!(result.source, CollectionSource::OnChainOnly);
        assert_eq!(result.token_ids, vec!["3", "7", "12"]);
        let ids: Vec<_> = result.items.iter().map(|i| i.token_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "7", "12"]);

        assert_eq!(result.items[0].name, "Hellraiser #3");
        assert_eq!(result.items[0].level, "3");
        assert_eq!(
            result.items[0].image,
            "https://gateway.pinata.cloud/ipfs/QmFighter/3.png"
        );

        let placeholder = &result.items[1];
        assert_eq!(placeholder.name, "Hellraiser #7");
        assert_eq!(placeholder.image, "/assets/defaultnft.png");
        assert_eq!(placeholder.level, "0");
        assert_eq!(placeholder.rarity, "Common");
        assert_eq!(placeholder.boost, "\u{2014}");
    }

    #[tokio::test]
    async fn failed_index_lookups_are_skipped() {
        let reader = MockReader {
            balance: 3,
            owned: vec![1, 2, 3],
            failing_indexes: vec![1],
            ..MockReader::default()
        };
        let result = resolver(reader, Arc::new(MockMetadata::default()))
            .resolve(Some(owner()))
            .await;
        assert_eq!(result.balance, 3);
        assert_eq!(result.token_ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn non_enumerable_collection_yields_no_items() {
        let reader = MockReader {
            balance: 2,
            owned: vec![4, 5],
            failing_indexes: vec![0, 1],
            ..MockReader::default()
        };
        let result = resolver(reader, Arc::new(MockMetadata::default()))
            .resolve(Some(owner()))
            .await;
        assert!(result.items.is_empty());
        assert_eq!(result.balance, 2);
    }

    #[tokio::test]
    async fn duplicate_ids_are_dropped() {
        let reader = MockReader {
            balance: 3,
            owned: vec![8, 8, 9],
            ..MockReader::default()
        };
        let result = resolver(reader, Arc::new(MockMetadata::default()))
            .resolve(Some(owner()))
            .await;
        assert_eq!(result.token_ids, vec!["8", "9"]);
        assert_eq!(result.items.len(), 2);
    }

    #[tokio::test]
    async fn max_tokens_caps_enumeration() {
        let reader = Arc::new(MockReader {
            balance: 5,
            owned: vec![1, 2, 3, 4, 5],
            ..MockReader::default()
        });
        let resolver = OwnershipResolver::new(Arc::new(MockMetadata::default()), "Hellraiser")
            .with_reader(reader.clone())
            .with_max_tokens(2);
        let result = resolver.resolve(Some(owner())).await;
        assert_eq!(result.items.len(), 2);
        assert_eq!(reader.index_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn owner_probe_scans_supply_until_balance_found() {
        let reader = MockReader {
            balance: 2,
            owned: vec![4, 30],
            total_supply: 60,
            ..MockReader::default()
        };
        let result = resolver(reader, Arc::new(MockMetadata::default()))
            .with_strategy(EnumerationStrategy::OwnerProbe)
            .resolve(Some(owner()))
            .await;
        assert_eq!(result.token_ids, vec!["4", "30"]);
    }

    #[tokio::test]
    async fn external_inventory_replaces_onchain_list() {
        let reader = MockReader {
            balance: 2,
            owned: vec![1, 2],
            ..MockReader::default()
        };
        let inventory = MockInventory {
            items: vec![external_item("77")],
            fail: false,
        };
        let result = resolver(reader, Arc::new(MockMetadata::default()))
            .with_inventory(Arc::new(inventory))
            .resolve(Some(owner()))
            .await;

        assert_eq!(result.source, CollectionSource::ExternalAuthoritative);
        assert_eq!(result.items, vec![external_item("77")]);
        assert_eq!(result.token_ids, vec!["77"]);
    }

    #[tokio::test]
    async fn empty_or_failed_external_inventory_keeps_onchain_list() {
        for inventory in [
            MockInventory { items: Vec::new(), fail: false },
            MockInventory { items: Vec::new(), fail: true },
        ] {
            let reader = MockReader {
                balance: 1,
                owned: vec![10],
                ..MockReader::default()
            };
            let result = resolver(reader, Arc::new(MockMetadata::default()))
                .with_inventory(Arc::new(inventory))
                .resolve(Some(owner()))
                .await;
            assert_eq!(result.source, CollectionSource::OnChainOnly);
            assert_eq!(result.token_ids, vec!["10"]);
        }
    }

    #[test]
    fn parses_enumeration_strategies() {
        assert_eq!(
            parse_enumeration_strategy(None).expect("default"),
            EnumerationStrategy::OwnerIndex
        );
        assert_eq!(
            parse_enumeration_strategy(Some(" Owner_Probe ")).expect("probe"),
            EnumerationStrategy::OwnerProbe
        );
        assert!(parse_enumeration_strategy(Some("scan_everything")).is_err());
    }

    #[tokio::test]
    async fn stale_generation_is_discarded() {
        let epochs = ResolutionEpochs::new();
        let first = epochs.begin("session-a").await;
        let second = epochs.begin("session-a").await;
        assert!(second > first);

        let mut newer = ResolvedCollection::empty();
        newer.balance = 2;
        assert!(epochs.commit("session-a", second, None, newer).await);

        let mut older = ResolvedCollection::empty();
        older.balance = 9;
        assert!(!epochs.commit("session-a", first, None, older).await);

        let view = epochs.current("session-a").await.expect("committed view");
        assert_eq!(view.generation, second);
        assert_eq!(view.collection.balance, 2);
        assert!(epochs.current("session-b").await.is_none());
    }

    #[tokio::test]
    async fn session_table_stays_within_cap() {
        let epochs = ResolutionEpochs::with_limits(50, 3_600);
        let now = Utc::now();
        for n in 0..1_000 {
            epochs.begin_at(&format!("session-{}", n), now).await;
        }
        assert_eq!(epochs.tracked_sessions().await, 50);
        // The newest session survives eviction.
        let generation = epochs.begin_at("session-999", now).await;
        assert_eq!(generation, 2);
    }

    #[tokio::test]
    async fn idle_sessions_are_swept_before_evicting_active_ones() {
        let epochs = ResolutionEpochs::with_limits(3, 60);
        let start = Utc::now();
        epochs.begin_at("idle-1", start).await;
        epochs.begin_at("idle-2", start).await;
        let later = start + Duration::seconds(40);
        epochs.begin_at("active", later).await;

        let much_later = start + Duration::seconds(90);
        epochs.begin_at("new", much_later).await;
        assert_eq!(epochs.tracked_sessions().await, 2);
        assert_eq!(epochs.begin_at("active", much_later).await, 2);
    }

    #[tokio::test]
    async fn evicted_session_commit_is_discarded() {
        let epochs = ResolutionEpochs::with_limits(1, 3_600);
        let generation = epochs.begin("first").await;
        epochs.begin("second").await;
        assert!(
            !epochs
                .commit("first", generation, None, ResolvedCollection::empty())
                .await
        );
        assert!(epochs.current("first").await.is_none());
        assert_eq!(epochs.tracked_sessions().await, 1);
    }

    // Counts overlapping tokenURI calls.
    #[derive(Default)]
    struct GatedReader {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl CollectionReader for GatedReader {
        async fn balance_of(&self, _owner: Address) -> Result<U256> {
            Ok(U256::from(4))
        }

        async fn token_of_owner_by_index(&self, _owner: Address, index: U256) -> Result<U256> {
            Ok(index + 1)
        }

        async fn token_uri(&self, token_id: U256) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("mock://{}", token_id))
        }

        async fn total_supply(&self) -> Result<U256> {
            Ok(U256::from(4))
        }

        async fn owner_of(&self, _token_id: U256) -> Result<Address> {
            Ok(owner())
        }
    }

    #[tokio::test]
    async fn concurrency_limit_applies_per_resolve() {
        let reader = Arc::new(GatedReader::default());
        let resolver = OwnershipResolver::new(Arc::new(MockMetadata::default()), "Hellraiser")
            .with_reader(reader.clone())
            .with_concurrency(2);

        let single = resolver.resolve(Some(owner())).await;
        assert_eq!(single.items.len(), 4);
        assert_eq!(reader.peak.load(Ordering::SeqCst), 2);

        reader.peak.store(0, Ordering::SeqCst);
        let (a, b) = tokio::join!(
            resolver.resolve(Some(owner())),
            resolver.resolve(Some(Address::repeat_byte(0x33)))
        );
        assert_eq!(a.items.len(), 4);
        assert_eq!(b.items.len(), 4);
        // Each call gets its own two permits.
        assert_eq!(reader.peak.load(Ordering::SeqCst), 4);
    }
}
