//! Fixed-window request counters.
//!
//! Each client key gets `limit` requests per window. Counters live in Redis
//! when `REDIS_URL` is set so every instance shares them, otherwise in
//! process memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;

use crate::error::AppError;

const KEY_PREFIX: &str = "ratelimit:";

/// Counter state right after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub count: u64,
    pub resets_in: Duration,
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key` and return the total in the current window.
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, AppError>;
}

pub struct RedisRateLimitStore {
    connection: ConnectionManager,
}

impl RedisRateLimitStore {
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Internal(format!("Invalid Redis URL: {e}")))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("Redis unavailable: {e}")))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, AppError> {
        let key = format!("{KEY_PREFIX}{key}");
        let mut conn = self.connection.clone();
        let redis_error = |e: redis::RedisError| AppError::ServiceUnavailable(e.to_string());

        let (count, ttl): (u64, i64) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .ttl(&key)
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        // A fresh counter (or one whose EXPIRE was lost) has no TTL yet.
        if ttl < 0 {
            let seconds = window.as_secs().max(1) as i64;
            conn.expire::<_, ()>(&key, seconds)
                .await
                .map_err(redis_error)?;
            return Ok(WindowHit {
                count,
                resets_in: window,
            });
        }
        Ok(WindowHit {
            count,
            resets_in: Duration::from_secs(ttl as u64),
        })
    }
}

/// Per-process counters: key -> (window start, count).
#[derive(Default)]
pub struct MemoryRateLimitStore {
    state: Mutex<MemoryWindows>,
}

#[derive(Default)]
struct MemoryWindows {
    counters: HashMap<String, (Instant, u64)>,
    last_prune: Option<Instant>,
}

impl MemoryWindows {
    /// Drop expired counters, at most once per window.
    fn prune(&mut self, now: Instant, window: Duration) {
        if self
            .last_prune
            .is_some_and(|at| now.duration_since(at) < window)
        {
            return;
        }
        self.counters
            .retain(|_, (start, _)| now.duration_since(*start) < window);
        self.last_prune = Some(now);
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, AppError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.prune(now, window);

        let entry = state.counters.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= window {
            *entry = (now, 0);
        }
        entry.1 += 1;
        Ok(WindowHit {
            count: entry.1,
            resets_in: window.saturating_sub(now.duration_since(entry.0)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { limit: u64, remaining: u64 },
    Limited { limit: u64, retry_after: u64 },
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Count a request. Store failures let the request through.
    pub async fn check(&self, key: &str) -> Decision {
        let hit = match self.store.hit(key, self.window).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "Rate limit store failed, allowing request");
                return Decision::Allowed {
                    limit: self.limit,
                    remaining: self.limit,
                };
            }
        };

        if hit.count > self.limit {
            Decision::Limited {
                limit: self.limit,
                retry_after: hit.resets_in.as_secs().max(1),
            }
        } else {
            Decision::Allowed {
                limit: self.limit,
                remaining: self.limit - hit.count,
            }
        }
    }
}
