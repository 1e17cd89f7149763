use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::models::{RateLimitBucket, RateLimitDecision};

/// Keyed storage for per-client request buckets.
pub trait RateLimitStore: Send {
    fn get(&self, key: &str) -> Option<RateLimitBucket>;

    fn set(&mut self, key: &str, bucket: RateLimitBucket);

    /// Drops buckets whose window has ended at `now`.
    fn prune_expired(&mut self, now: DateTime<Utc>) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    buckets: HashMap<String, RateLimitBucket>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn get(&self, key: &str) -> Option<RateLimitBucket> {
        self.buckets.get(key).copied()
    }

    fn set(&mut self, key: &str, bucket: RateLimitBucket) {
        self.buckets.insert(key.to_string(), bucket);
    }

    fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_elapsed(now));
        before - self.buckets.len()
    }
}

/// Fixed-window limiter: counters reset exactly when the window ends.
#[derive(Clone)]
pub struct FixedWindowRateLimiter {
    store: Arc<Mutex<Box<dyn RateLimitStore>>>,
    window: Duration,
    max_requests: u32,
}

impl FixedWindowRateLimiter {
    pub fn new(store: Box<dyn RateLimitStore>, window: Duration, max_requests: u32) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            window,
            max_requests,
        }
    }

    /// Counts one request for `key` at `now`.
    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut store = self.store.lock().await;

        let bucket = match store.get(key) {
            Some(bucket) if !bucket.is_elapsed(now) => RateLimitBucket {
                count: bucket.count.saturating_add(1),
                window_ends_at: bucket.window_ends_at,
            },
            _ => {
                store.prune_expired(now);
                RateLimitBucket {
                    count: 1,
                    window_ends_at: now + self.window,
                }
            }
        };
        store.set(key, bucket);

        if bucket.count > self.max_requests {
            RateLimitDecision::Limited {
                retry_after_seconds: seconds_until(now, bucket.window_ends_at),
            }
        } else {
            RateLimitDecision::Allowed
        }
    }
}

/// Whole seconds until `deadline`, rounded up and never below 1.
fn seconds_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> u64 {
    let millis = (deadline - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}
