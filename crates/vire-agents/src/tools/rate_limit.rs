//! Keyed minimum-interval rate limiter
//!
//! Search backends are polite-use APIs. Each key gets at most one request
//! per interval across every caller sharing the limiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default spacing between calls to the same search backend
pub const DEFAULT_SEARCH_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DELAY)
    }
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `key` may be called again and reserve the following slot
    pub async fn acquire(&self, key: &str) {
        let wait_until = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(key).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(key.to_string(), slot + self.interval);
            slot
        };

        let now = Instant::now();
        if wait_until > now {
            debug!(
                key,
                wait_ms = (wait_until - now).as_millis() as u64,
                "Rate limit delay"
            );
            tokio::time::sleep_until(wait_until).await;
        }
    }
}
