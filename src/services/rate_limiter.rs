use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::sync::Mutex;

use crate::{
    config::Config,
    constants::{RATE_LIMIT_MAX_TRACKED_CLIENTS, RPC_RATE_LIMIT_MAX_REQUESTS, RPC_RATE_LIMIT_WINDOW_SECS},
    error::Result,
};

/// Outcome of applying one request to a client's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub count: u64,
    pub window_end_ms: i64,
}

impl RateDecision {
    fn unlimited(now_ms: i64) -> Self {
        Self {
            allowed: true,
            count: 0,
            window_end_ms: now_ms,
        }
    }
}

/// Storage for per-client fixed-window counters.
#[async_trait::async_trait]
pub trait CounterBackend: Send + Sync {
    async fn hit(&self, key: &str, now_ms: i64, window_ms: i64, limit: u64) -> Result<RateDecision>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u64,
    window_end_ms: i64,
}

/// Process-local counters. Expired records are swept once the table holds
/// `max_tracked` clients.
pub struct MemoryCounterBackend {
    records: Mutex<HashMap<String, WindowRecord>>,
    max_tracked: usize,
}

impl MemoryCounterBackend {
    pub fn new(max_tracked: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            max_tracked: max_tracked.max(1),
        }
    }

    pub async fn tracked_clients(&self) -> usize {
        self.records.lock().await.len()
    }
}

impl Default for MemoryCounterBackend {
    fn default() -> Self {
        Self::new(RATE_LIMIT_MAX_TRACKED_CLIENTS)
    }
}

#[async_trait::async_trait]
impl CounterBackend for MemoryCounterBackend {
    async fn hit(&self, key: &str, now_ms: i64, window_ms: i64, limit: u64) -> Result<RateDecision> {
        let mut records = self.records.lock().await;

        if !records.contains_key(key) && records.len() >= self.max_tracked {
            let before = records.len();
            records.retain(|_, record| now_ms < record.window_end_ms);
            tracing::debug!(
                "rate limiter sweep removed={} remaining={}",
                before - records.len(),
                records.len()
            );
            if records.len() >= self.max_tracked {
                tracing::warn!(
                    "rate limiter table still full after sweep tracked={} cap={}",
                    records.len(),
                    self.max_tracked
                );
            }
        }

        let record = records.entry(key.to_string()).or_insert(WindowRecord {
            count: 0,
            window_end_ms: i64::MIN,
        });

        if now_ms >= record.window_end_ms {
            *record = WindowRecord {
                count: 1,
                window_end_ms: now_ms.saturating_add(window_ms),
            };
            return Ok(RateDecision {
                allowed: true,
                count: 1,
                window_end_ms: record.window_end_ms,
            });
        }

        if record.count < limit {
            record.count += 1;
            return Ok(RateDecision {
                allowed: true,
                count: record.count,
                window_end_ms: record.window_end_ms,
            });
        }

        Ok(RateDecision {
            allowed: false,
            count: record.count,
            window_end_ms: record.window_end_ms,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Counters shared across instances: `INCR` plus `PEXPIRE` on the first hit.
pub struct RedisCounterBackend {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisCounterBackend {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            prefix: "rpc:rl".to_string(),
        }
    }

    fn key(&self, client: &str) -> String {
        format!("{}:{}", self.prefix, client)
    }
}

#[async_trait::async_trait]
impl CounterBackend for RedisCounterBackend {
    async fn hit(&self, key: &str, now_ms: i64, window_ms: i64, limit: u64) -> Result<RateDecision> {
        let key = self.key(key);
        let mut conn = self.conn.clone();

        let count: u64 = conn.incr(&key, 1_u64).await?;
        let mut ttl_ms: i64 = if count == 1 { -1 } else { conn.pttl(&key).await? };
        if ttl_ms < 0 {
            let _: bool = conn.pexpire(&key, window_ms).await?;
            ttl_ms = window_ms;
        }

        Ok(RateDecision {
            allowed: count <= limit,
            count,
            window_end_ms: now_ms.saturating_add(ttl_ms),
        })
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Fixed-window request limiter keyed by client identity.
#[derive(Clone)]
pub struct FixedWindowLimiter {
    backend: Arc<dyn CounterBackend>,
    window_ms: i64,
    limit: u64,
    enabled: bool,
}

impl FixedWindowLimiter {
    pub fn new(backend: Arc<dyn CounterBackend>, window_secs: u64, limit: u32) -> Self {
        Self {
            backend,
            window_ms: i64::try_from(window_secs.max(1).saturating_mul(1_000)).unwrap_or(i64::MAX),
            limit: u64::from(limit.max(1)),
            enabled: true,
        }
    }

    pub fn from_config(config: &Config, backend: Arc<dyn CounterBackend>) -> Self {
        let mut limiter = Self::new(
            backend,
            config.rpc_rate_limit_window_secs,
            config.rpc_rate_limit_max_requests,
        );
        limiter.enabled = config.rpc_rate_limit_enabled;
        limiter
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn window_secs(&self) -> u64 {
        (self.window_ms / 1_000) as u64
    }

    pub async fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Utc::now().timestamp_millis()).await
    }

    /// Applies one request at `now_ms`. Backend failures admit the request.
    pub async fn check_at(&self, key: &str, now_ms: i64) -> RateDecision {
        if !self.enabled {
            return RateDecision::unlimited(now_ms);
        }
        match self.backend.hit(key, now_ms, self.window_ms, self.limit).await {
            Ok(decision) => {
                if !decision.allowed {
                    tracing::warn!(
                        "rpc rate limit exceeded client={} count={} limit={}",
                        key,
                        decision.count,
                        self.limit
                    );
                }
                decision
            }
            Err(err) => {
                tracing::warn!(
                    "rate limiter backend={} unavailable, admitting client={} err={}",
                    self.backend.name(),
                    key,
                    err
                );
                RateDecision::unlimited(now_ms)
            }
        }
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(
            Arc::new(MemoryCounterBackend::default()),
            RPC_RATE_LIMIT_WINDOW_SECS,
            RPC_RATE_LIMIT_MAX_REQUESTS,
        )
    }
}
