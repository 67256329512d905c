/// Application constants

// Collection (Shape Network)
pub const DEFAULT_HELLRAISER_CONTRACT: &str = "0xA7FF5e756a61D1Ff01838247025943c6F7Ba2188";
pub const DEFAULT_COLLECTION_NAME: &str = "Hellraiser";
pub const DEFAULT_SHAPE_CHAIN_ID: u64 = 360;
pub const DEFAULT_SHAPE_RPC_URL: &str = "https://mainnet.shape.network";
pub const DEFAULT_FIGHTERS_API_URL: &str = "https://api.unboundgames.xyz";

// Gateways
pub const IPFS_GATEWAY_URL: &str = "https://gateway.pinata.cloud/ipfs/";
pub const IPFS_BARE_HASH_GATEWAY_URL: &str = "https://ipfs.io/ipfs/";
pub const ARWEAVE_GATEWAY_URL: &str = "https://arweave.net/";

// Marketplaces
pub const MINTIFY_NFT_BASE_URL: &str = "https://mintify.xyz/nft/shape";
pub const OPENSEA_NFT_BASE_URL: &str = "https://opensea.io/item/shape";

// Display defaults
pub const DEFAULT_NFT_IMAGE: &str = "/assets/defaultnft.png";
pub const DEFAULT_LEVEL: &str = "0";
pub const DEFAULT_RARITY: &str = "Common";
pub const DEFAULT_BOOST: &str = "\u{2014}";

// Fighter attributes in display order, with their baseline values
pub const STANDARD_ATTRIBUTES: [(&str, u32); 12] = [
    ("punch", 92),
    ("endurance", 85),
    ("speed", 83),
    ("defense", 66),
    ("technique", 73),
    ("mental strength", 84),
    ("intelligence", 88),
    ("charisma", 91),
    ("stealth", 84),
    ("leadership", 90),
    ("agility", 86),
    ("luck", 89),
];

// Metadata resolution
pub const METADATA_FETCH_TIMEOUT_SECS: u64 = 10;
pub const METADATA_FETCH_CONCURRENCY: usize = 8;
pub const ONCHAIN_READ_TIMEOUT_MS: u64 = 3_500;
pub const MAX_TOKENS_PER_WALLET: usize = 1_000;
pub const OWNER_PROBE_BATCH_SIZE: usize = 25;
pub const MAX_TRACKED_SESSIONS: usize = 10_000;
pub const SESSION_IDLE_TTL_SECS: u64 = 3_600;

// RPC guard
pub const RPC_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const RPC_RATE_LIMIT_MAX_REQUESTS: u32 = 200;
pub const RATE_LIMIT_MAX_TRACKED_CLIENTS: usize = 50_000;
pub const RATE_LIMIT_UNKNOWN_CLIENT: &str = "unknown";
pub const RPC_PROXY_USER_AGENT: &str = "Squad-Unbound/1.0";
pub const RPC_PROXY_TIMEOUT_SECS: u64 = 30;

// Training
pub const STRAVA_CONNECTION_VALIDITY_DAYS: i64 = 30;
pub const MAX_DISTANCE_PER_FIGHTER_KM: f64 = 20.0;
pub const DAILY_SYNC_LIMIT: u32 = 20;
pub const NEW_ACTIVITY_THRESHOLD_KM: f64 = 0.1;

// Storage key prefixes
pub const PROFILE_STORAGE_PREFIX: &str = "user_profile_";
pub const TRAINING_STORAGE_PREFIX: &str = "training";

// Profile
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

// API version
pub const API_VERSION: &str = "v1";
