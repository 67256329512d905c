use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{wallet_param, AppState};
use crate::{
    error::Result,
    models::{
        ApiResponse, StravaConnectRequest, StravaConnection, SyncOutcome, SyncRequest,
        TrainingStatus,
    },
};

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub connected: bool,
}

/// GET /api/v1/training/{address}
pub async fn get_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<TrainingStatus>>> {
    let wallet = wallet_param(&address)?;
    let status = state.training.status(&wallet).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// POST /api/v1/training/{address}/strava/connect
pub async fn connect_strava(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<StravaConnectRequest>,
) -> Result<Json<ApiResponse<StravaConnection>>> {
    let wallet = wallet_param(&address)?;
    let connection = state
        .training
        .connect(&wallet, req.auth_code.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(connection)))
}

/// DELETE /api/v1/training/{address}/strava
pub async fn disconnect_strava(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<DisconnectResponse>>> {
    let wallet = wallet_param(&address)?;
    state.training.disconnect(&wallet).await?;
    Ok(Json(ApiResponse::success(DisconnectResponse { connected: false })))
}

/// POST /api/v1/training/{address}/sync
pub async fn sync_activity(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<ApiResponse<SyncOutcome>>> {
    let wallet = wallet_param(&address)?;
    let outcome = state.training.sync(&wallet, req.distance_km).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_state;
    use crate::error::AppError;

    const WALLET: &str = "0xA7FF5e756a61D1Ff01838247025943c6F7Ba2188";

    fn path() -> Path<String> {
        Path(WALLET.to_string())
    }

    #[tokio::test]
    async fn sync_requires_connection() {
        let state = test_state::build("http://127.0.0.1:9", 200);
        let err = sync_activity(State(state), path(), Json(SyncRequest { distance_km: 3.0 }))
            .await
            .expect_err("not connected");
        assert!(matches!(err, AppError::StravaNotConnected));
    }

    #[tokio::test]
    async fn connect_sync_disconnect_flow() {
        let state = test_state::build("http://127.0.0.1:9", 200);

        let Json(connection) = connect_strava(
            State(state.clone()),
            path(),
            Json(StravaConnectRequest {
                auth_code: Some("abc".to_string()),
            }),
        )
        .await
        .expect("connect");
        assert!(connection.data.connected);

        let Json(outcome) = sync_activity(
            State(state.clone()),
            path(),
            Json(SyncRequest { distance_km: 6.0 }),
        )
        .await
        .expect("sync");
        assert_eq!(outcome.data.result.endurance_delta, 3);
        assert_eq!(outcome.data.status.quota.syncs_remaining, 19);

        let Json(status) = get_status(State(state.clone()), path())
            .await
            .expect("status");
        assert!(status.data.strava.connected);
        assert_eq!(status.data.current_distance_km, 6.0);

        disconnect_strava(State(state.clone()), path())
            .await
            .expect("disconnect");
        let Json(status) = get_status(State(state), path()).await.expect("status");
        assert!(!status.data.strava.connected);
    }
}
