//! Mail throttle: a fixed-window counter per recipient, bounding outbound
//! notification volume.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[async_trait]
pub trait ThrottleStore: Send + Sync {
    /// Atomically count an attempt under `key`. Returns true while the
    /// window's count stays at or below `limit`. The window's TTL is set
    /// when the counter is created and never refreshed, so repeated or
    /// refused attempts cannot extend it.
    async fn increment_if_below(
        &self,
        key: &str,
        limit: u32,
        ttl: Duration,
    ) -> Result<bool, anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisThrottleStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisThrottleStore {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl ThrottleStore for RedisThrottleStore {
    async fn increment_if_below(
        &self,
        key: &str,
        limit: u32,
        ttl: Duration,
    ) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let key = format!("mail_throttle:{}", key);

        let count: i64 = redis::cmd("INCR")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to increment throttle counter: {}", e))?;

        if count == 1 {
            redis::cmd("EXPIRE")
                .arg(&key)
                .arg(ttl.as_secs())
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to expire throttle counter: {}", e))?;
        }

        // Counts past the limit are inert: the TTL was fixed at window
        // start, so the overshoot expires with the window.
        Ok(count <= limit as i64)
    }
}

/// Mutex-backed store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryThrottleStore {
    counters: Mutex<HashMap<String, (u32, Instant)>>,
}

impl InMemoryThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThrottleStore for InMemoryThrottleStore {
    async fn increment_if_below(
        &self,
        key: &str,
        limit: u32,
        ttl: Duration,
    ) -> Result<bool, anyhow::Error> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| anyhow::anyhow!("throttle mutex poisoned: {}", e))?;

        let now = Instant::now();
        let entry = counters.entry(key.to_string()).or_insert((0, now + ttl));

        if now >= entry.1 {
            // Window expired; start a fresh one.
            *entry = (0, now + ttl);
        }

        if entry.0 >= limit {
            return Ok(false);
        }

        entry.0 += 1;
        Ok(true)
    }
}

/// Gate in front of outbound mail, keyed by recipient.
#[derive(Clone)]
pub struct MailThrottle {
    store: std::sync::Arc<dyn ThrottleStore>,
    limit: u32,
    expiration: Duration,
}

impl MailThrottle {
    pub fn new(store: std::sync::Arc<dyn ThrottleStore>, config: &crate::config::MailThrottleConfig) -> Self {
        Self {
            store,
            limit: config.limit,
            expiration: Duration::from_secs(config.expiration_seconds),
        }
    }

    /// Whether a message may be sent to `key` right now. Store failures
    /// refuse the send; the throttle protects a scarce mail quota.
    pub async fn allow(&self, key: &str) -> bool {
        match self
            .store
            .increment_if_below(key, self.limit, self.expiration)
            .await
        {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Throttle store error; refusing send");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailThrottleConfig;
    use std::sync::Arc;

    fn throttle(limit: u32, expiration_seconds: u64) -> MailThrottle {
        MailThrottle::new(
            Arc::new(InMemoryThrottleStore::new()),
            &MailThrottleConfig {
                limit,
                expiration_seconds,
            },
        )
    }

    #[tokio::test]
    async fn allows_up_to_limit_then_refuses() {
        let throttle = throttle(2, 5);

        assert!(throttle.allow("bob@testy.com").await);
        assert!(throttle.allow("bob@testy.com").await);
        assert!(!throttle.allow("bob@testy.com").await);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let throttle = throttle(1, 5);

        assert!(throttle.allow("bob@testy.com").await);
        assert!(!throttle.allow("bob@testy.com").await);
        assert!(throttle.allow("lisa@testy.com").await);
    }

    #[tokio::test]
    async fn window_resets_after_expiration() {
        let throttle = throttle(2, 1);

        assert!(throttle.allow("bob@testy.com").await);
        assert!(throttle.allow("bob@testy.com").await);
        assert!(!throttle.allow("bob@testy.com").await);

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        assert!(throttle.allow("bob@testy.com").await);
    }

    #[tokio::test]
    async fn refused_attempts_do_not_extend_window() {
        let store = Arc::new(InMemoryThrottleStore::new());
        let throttle = MailThrottle::new(
            store,
            &MailThrottleConfig {
                limit: 1,
                expiration_seconds: 1,
            },
        );

        assert!(throttle.allow("bob@testy.com").await);

        // Hammer the gate past the limit for most of the window.
        for _ in 0..5 {
            assert!(!throttle.allow("bob@testy.com").await);
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }

        // The window still expires on schedule from its first increment.
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        assert!(throttle.allow("bob@testy.com").await);
    }
}
