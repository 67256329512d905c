// src/models/mod.rs
pub mod nft;
pub mod user;

pub use nft::{
    CollectionItem, CollectionSource, NftMetadata, NumericAttribute, ResolvedCollection,
    TraitEntry, TraitValue,
};
pub use user::{
    ApiResponse, ProfileUpdate, StravaConnectRequest, StravaConnection, SyncOutcome, SyncQuota,
    SyncRequest, SyncResult, TrainingStatus, UserProfile,
};
