use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub collection: String,
    pub chain_id: u64,
    pub enumeration_strategy: String,
    pub rate_limiter: String,
    pub rate_limit_enabled: bool,
    pub storage: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        collection: state.resolver.collection_name().to_string(),
        chain_id: state.config.shape_chain_id,
        enumeration_strategy: format!("{:?}", state.resolver.strategy()),
        rate_limiter: state.limiter.backend_name().to_string(),
        rate_limit_enabled: state.limiter.is_enabled(),
        storage: state.kv_backend.to_string(),
    })
}
