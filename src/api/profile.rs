use axum::{
    extract::{Path, State},
    Json,
};

use super::{wallet_param, AppState};
use crate::{
    error::Result,
    models::{ApiResponse, ProfileUpdate, UserProfile},
};

/// GET /api/v1/profile/{address}
pub async fn get_profile(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let wallet = wallet_param(&address)?;
    let profile = state.profiles.load(&wallet).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// PUT /api/v1/profile/{address}
pub async fn update_profile(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let wallet = wallet_param(&address)?;
    let profile = state.profiles.update(&wallet, req).await?;
    Ok(Json(ApiResponse::success(profile)))
}
