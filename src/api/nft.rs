use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::{
    error::{AppError, Result},
    models::{ApiResponse, CollectionItem, CollectionSource, NumericAttribute, ResolvedCollection},
    services::display::numeric_attributes,
    utils::{mintify_url, normalize_wallet, opensea_url, parse_wallet_address},
};

const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Serialize)]
pub struct OwnedItemView {
    #[serde(flatten)]
    pub item: CollectionItem,
    pub stats: Vec<NumericAttribute>,
    pub mintify_url: String,
    pub opensea_url: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionView {
    pub source: CollectionSource,
    pub balance: u64,
    pub token_ids: Vec<String>,
    pub items: Vec<OwnedItemView>,
}

#[derive(Debug, Serialize)]
pub struct OwnedCollectionResponse {
    pub wallet: String,
    pub session_id: String,
    pub generation: u64,
    /// A newer lookup for the same session started before this one finished.
    pub stale: bool,
    #[serde(flatten)]
    pub collection: CollectionView,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub generation: u64,
    pub wallet: Option<String>,
    pub resolved_at: DateTime<Utc>,
    #[serde(flatten)]
    pub collection: CollectionView,
}

#[derive(Debug, Serialize)]
pub struct CollectionConfigResponse {
    pub contract_address: String,
    pub chain_id: u64,
    pub collection_name: String,
    pub onchain_enabled: bool,
    pub fighters_api_enabled: bool,
    pub enumeration_strategy: String,
}

fn collection_view(contract: &str, collection: ResolvedCollection) -> CollectionView {
    let items = collection
        .items
        .into_iter()
        .map(|item| OwnedItemView {
            stats: numeric_attributes(&item.attributes),
            mintify_url: mintify_url(contract, &item.token_id),
            opensea_url: opensea_url(contract, &item.token_id),
            item,
        })
        .collect();
    CollectionView {
        source: collection.source,
        balance: collection.balance,
        token_ids: collection.token_ids,
        items,
    }
}

/// GET /api/v1/nft/owned/{address}
pub async fn get_owned(
    State(state): State<AppState>,
    Path(address): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<OwnedCollectionResponse>>> {
    let owner = parse_wallet_address(&address)?;
    let wallet = normalize_wallet(&owner);
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| wallet.clone());

    let generation = state.epochs.begin(&session_id).await;
    let collection = state.resolver.resolve(Some(owner)).await;
    let committed = state
        .epochs
        .commit(&session_id, generation, Some(wallet.clone()), collection.clone())
        .await;

    Ok(Json(ApiResponse::success(OwnedCollectionResponse {
        wallet,
        session_id,
        generation,
        stale: !committed,
        collection: collection_view(&state.config.hellraiser_contract, collection),
    })))
}

/// GET /api/v1/nft/session/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionResponse>>> {
    let view = state
        .epochs
        .current(&session_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No resolved collection for session {}", session_id)))?;

    Ok(Json(ApiResponse::success(SessionResponse {
        session_id,
        generation: view.generation,
        wallet: view.wallet,
        resolved_at: view.resolved_at,
        collection: collection_view(&state.config.hellraiser_contract, view.collection),
    })))
}

/// GET /api/v1/nft/config
pub async fn get_collection_config(
    State(state): State<AppState>,
) -> Json<ApiResponse<CollectionConfigResponse>> {
    Json(ApiResponse::success(CollectionConfigResponse {
        contract_address: state.config.hellraiser_contract.clone(),
        chain_id: state.config.shape_chain_id,
        collection_name: state.resolver.collection_name().to_string(),
        onchain_enabled: state.config.has_collection_contract(),
        fighters_api_enabled: !state.config.fighters_api_url.is_empty(),
        enumeration_strategy: state.config.enumeration_strategy.clone(),
    }))
}
