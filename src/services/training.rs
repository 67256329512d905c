use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    constants::{
        DAILY_SYNC_LIMIT, MAX_DISTANCE_PER_FIGHTER_KM, NEW_ACTIVITY_THRESHOLD_KM,
        STRAVA_CONNECTION_VALIDITY_DAYS, TRAINING_STORAGE_PREFIX,
    },
    error::{AppError, Result},
    models::{StravaConnection, SyncOutcome, SyncQuota, SyncResult, TrainingStatus},
    services::kv_store::KvStore,
};

const STRAVA_CONNECTED: &str = "strava_connected";
const STRAVA_CONNECTED_TIMESTAMP: &str = "strava_connected_timestamp";
const STRAVA_AUTH_CODE: &str = "strava_auth_code";
const SYNCS_REMAINING: &str = "syncs_remaining";
const LAST_SYNC_RESET: &str = "last_sync_reset";
const CURRENT_DISTANCE: &str = "current_distance";
const CYCLE_TOTAL_DISTANCE: &str = "cycle_total_distance";

pub fn training_key(wallet: &str, field: &str) -> String {
    format!(
        "{}:{}:{}",
        TRAINING_STORAGE_PREFIX,
        wallet.trim().to_lowercase(),
        field
    )
}

/// Reported gains for one synced distance. Distances at or below the
/// new-activity threshold count as no activity.
pub fn sync_result_for(distance_km: f64) -> SyncResult {
    if distance_km > NEW_ACTIVITY_THRESHOLD_KM {
        SyncResult {
            distance: distance_km,
            endurance_delta: (distance_km * 0.5).round() as i64,
            level_delta: (distance_km / 5.0).floor() as i64,
        }
    } else {
        SyncResult {
            distance: 0.0,
            endurance_delta: 0,
            level_delta: 0,
        }
    }
}

/// Per-wallet training state: Strava connection, daily sync quota and
/// distance counters.
///
/// Writes for one wallet are serialized in-process. The quota claim and the
/// distance updates use atomic counters, so instances sharing Redis cannot
/// overspend the daily limit either.
#[derive(Clone)]
pub struct TrainingStore {
    kv: Arc<dyn KvStore>,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TrainingStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // Idle wallets are dropped from the map whenever a lock is taken.
    async fn wallet_lock(&self, wallet: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(wallet.trim().to_lowercase())
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn status(&self, wallet: &str) -> Result<TrainingStatus> {
        self.status_at(wallet, Utc::now()).await
    }

    pub async fn status_at(&self, wallet: &str, now: DateTime<Utc>) -> Result<TrainingStatus> {
        Ok(TrainingStatus {
            strava: self.connection_at(wallet, now).await?,
            quota: self.quota_at(wallet, now).await?,
            current_distance_km: self.read_distance(wallet, CURRENT_DISTANCE).await?,
            cycle_total_distance_km: self.read_distance(wallet, CYCLE_TOTAL_DISTANCE).await?,
            max_distance_km: MAX_DISTANCE_PER_FIGHTER_KM,
        })
    }

    pub async fn connect(&self, wallet: &str, auth_code: Option<&str>) -> Result<StravaConnection> {
        self.connect_at(wallet, auth_code, Utc::now()).await
    }

    pub async fn connect_at(
        &self,
        wallet: &str,
        auth_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StravaConnection> {
        let _guard = self.wallet_lock(wallet).await;
        self.kv
            .set(&training_key(wallet, STRAVA_CONNECTED), "true")
            .await?;
        self.kv
            .set(
                &training_key(wallet, STRAVA_CONNECTED_TIMESTAMP),
                &now.timestamp_millis().to_string(),
            )
            .await?;
        match auth_code.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => {
                self.kv
                    .set(&training_key(wallet, STRAVA_AUTH_CODE), code)
                    .await?
            }
            None => self.kv.delete(&training_key(wallet, STRAVA_AUTH_CODE)).await?,
        }
        tracing::info!("strava connected wallet={}", wallet);

        Ok(StravaConnection {
            connected: true,
            connected_at: Some(now),
        })
    }

    pub async fn disconnect(&self, wallet: &str) -> Result<()> {
        let _guard = self.wallet_lock(wallet).await;
        self.clear_connection(wallet).await?;
        tracing::info!("strava disconnected wallet={}", wallet);
        Ok(())
    }

    async fn clear_connection(&self, wallet: &str) -> Result<()> {
        for field in [STRAVA_CONNECTED, STRAVA_CONNECTED_TIMESTAMP, STRAVA_AUTH_CODE] {
            self.kv.delete(&training_key(wallet, field)).await?;
        }
        Ok(())
    }

    pub async fn sync(&self, wallet: &str, distance_km: f64) -> Result<SyncOutcome> {
        self.sync_at(wallet, distance_km, Utc::now()).await
    }

    pub async fn sync_at(
        &self,
        wallet: &str,
        distance_km: f64,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(AppError::BadRequest(
                "distance_km must be a non-negative number".to_string(),
            ));
        }

        let _guard = self.wallet_lock(wallet).await;
        let connection = self.connection_at(wallet, now).await?;
        if !connection.connected {
            return Err(AppError::StravaNotConnected);
        }
        let quota = self.quota_at(wallet, now).await?;
        if quota.syncs_remaining == 0 {
            return Err(AppError::SyncLimitReached);
        }

        // Claim one sync with a decrement; a negative result means another
        // instance spent the last one first.
        let remaining_key = training_key(wallet, SYNCS_REMAINING);
        let remaining = self.kv.incr_by(&remaining_key, -1).await?;
        if remaining < 0 {
            self.kv.incr_by(&remaining_key, 1).await?;
            return Err(AppError::SyncLimitReached);
        }
        let syncs_remaining = u32::try_from(remaining)
            .unwrap_or(DAILY_SYNC_LIMIT)
            .min(DAILY_SYNC_LIMIT);

        let cycle_total = self
            .kv
            .incr_by_float(&training_key(wallet, CYCLE_TOTAL_DISTANCE), distance_km)
            .await?;
        let current_key = training_key(wallet, CURRENT_DISTANCE);
        let mut current = self.kv.incr_by_float(&current_key, distance_km).await?;
        if current > MAX_DISTANCE_PER_FIGHTER_KM {
            current = MAX_DISTANCE_PER_FIGHTER_KM;
            self.kv.set(&current_key, &current.to_string()).await?;
        }

        let result = sync_result_for(distance_km);
        tracing::info!(
            "training sync wallet={} distance_km={:.2} current_km={:.2} syncs_remaining={}",
            wallet,
            distance_km,
            current,
            syncs_remaining
        );

        Ok(SyncOutcome {
            result,
            status: TrainingStatus {
                strava: connection,
                quota: SyncQuota {
                    syncs_remaining,
                    ..quota
                },
                current_distance_km: current,
                cycle_total_distance_km: cycle_total,
                max_distance_km: MAX_DISTANCE_PER_FIGHTER_KM,
            },
        })
    }

    // Reads the connection flag, clearing it once it is older than the validity period.
    async fn connection_at(&self, wallet: &str, now: DateTime<Utc>) -> Result<StravaConnection> {
        let flag = self.kv.get(&training_key(wallet, STRAVA_CONNECTED)).await?;
        if flag.as_deref() != Some("true") {
            return Ok(StravaConnection {
                connected: false,
                connected_at: None,
            });
        }

        let connected_at = self
            .kv
            .get(&training_key(wallet, STRAVA_CONNECTED_TIMESTAMP))
            .await?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single());

        let Some(connected_at) = connected_at else {
            return Ok(StravaConnection {
                connected: true,
                connected_at: None,
            });
        };

        if now - connected_at >= Duration::days(STRAVA_CONNECTION_VALIDITY_DAYS) {
            tracing::info!("strava connection expired wallet={}", wallet);
            self.clear_connection(wallet).await?;
            return Ok(StravaConnection {
                connected: false,
                connected_at: None,
            });
        }

        Ok(StravaConnection {
            connected: true,
            connected_at: Some(connected_at),
        })
    }

    // Resets the quota when the stored reset date is not today (UTC).
    async fn quota_at(&self, wallet: &str, now: DateTime<Utc>) -> Result<SyncQuota> {
        let today = now.date_naive();
        let last_reset = self
            .kv
            .get(&training_key(wallet, LAST_SYNC_RESET))
            .await?
            .and_then(|raw| parse_reset_date(&raw));
        let stored = self
            .kv
            .get(&training_key(wallet, SYNCS_REMAINING))
            .await?
            .and_then(|raw| raw.trim().parse::<u32>().ok());

        if let (Some(last_reset), Some(syncs_remaining)) = (last_reset, stored) {
            if last_reset == today {
                return Ok(SyncQuota {
                    syncs_remaining: syncs_remaining.min(DAILY_SYNC_LIMIT),
                    daily_limit: DAILY_SYNC_LIMIT,
                    last_reset,
                });
            }
        }

        self.kv
            .set(
                &training_key(wallet, SYNCS_REMAINING),
                &DAILY_SYNC_LIMIT.to_string(),
            )
            .await?;
        self.kv
            .set(&training_key(wallet, LAST_SYNC_RESET), &now.to_rfc3339())
            .await?;
        Ok(SyncQuota {
            syncs_remaining: DAILY_SYNC_LIMIT,
            daily_limit: DAILY_SYNC_LIMIT,
            last_reset: today,
        })
    }

    async fn read_distance(&self, wallet: &str, field: &str) -> Result<f64> {
        Ok(self
            .kv
            .get(&training_key(wallet, field))
            .await?
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(0.0))
    }
}

fn parse_reset_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}
