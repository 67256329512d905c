use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==================== PROFILE ====================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// URL or base64 image data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub wallet_address: String,
}

impl UserProfile {
    pub fn for_wallet(wallet_address: impl Into<String>) -> Self {
        Self {
            username: None,
            avatar: None,
            wallet_address: wallet_address.into(),
        }
    }

    pub fn has_profile(&self) -> bool {
        self.username.is_some() || self.avatar.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub avatar: Option<String>,
}

// ==================== TRAINING ====================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StravaConnection {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncQuota {
    pub syncs_remaining: u32,
    pub daily_limit: u32,
    pub last_reset: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingStatus {
    pub strava: StravaConnection,
    pub quota: SyncQuota,
    pub current_distance_km: f64,
    pub cycle_total_distance_km: f64,
    pub max_distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    pub distance: f64,
    pub endurance_delta: i64,
    pub level_delta: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub result: SyncResult,
    pub status: TrainingStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub distance_km: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaConnectRequest {
    pub auth_code: Option<String>,
}

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
