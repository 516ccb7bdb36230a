use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Keyed rate limiting. `true` means the request is allowed and the
/// attempt has been recorded.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check_and_consume(&self, key: &str) -> bool;
}

/// In-process sliding window. Suits a single-instance deployment; a
/// shared-store implementation can replace it behind the trait without
/// touching the lifecycle manager.
pub struct SlidingWindowLimiter {
    max_hits: usize,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_hits: usize, window: Duration) -> Self {
        Self {
            max_hits,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn check_and_consume(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock();

        let entry = hits.entry(key.to_string()).or_default();
        entry.retain(|at| now.duration_since(*at) < self.window);

        if entry.len() >= self.max_hits {
            return false;
        }
        entry.push(now);
        true
    }
}
