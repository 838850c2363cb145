use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use relay_core::BoxError;

/// The state of a bucket after one increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Hits in the current window, including this one.
    pub count: u64,
    /// Time until the window resets.
    pub resets_in: Duration,
}

/// Counter storage behind the rate limiter.
///
/// `increment` must be atomic per key: two concurrent increments of one key
/// never observe the same count.
#[async_trait]
pub trait RateLimitStore: Send + Sync + 'static {
    /// Counts a hit on `key`, opening a new window of length `window` if the
    /// previous one has expired.
    async fn increment(&self, key: &str, window: Duration) -> Result<Hit, BoxError>;

    /// Clears `key`.
    async fn reset(&self, key: &str) -> Result<(), BoxError>;
}

#[derive(Debug)]
struct Bucket {
    count: u64,
    expires_at: Instant,
}

/// In-process fixed-window store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, Bucket>>,
}

/// Expired buckets are swept once the map grows past this many entries.
const SWEEP_THRESHOLD: usize = 1024;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired bucket.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.buckets.lock().retain(|_, b| b.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<Hit, BoxError> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        if buckets.len() >= SWEEP_THRESHOLD {
            buckets.retain(|_, b| b.expires_at > now);
        }
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            count: 0,
            expires_at: now + window,
        });
        if bucket.expires_at <= now {
            bucket.count = 0;
            bucket.expires_at = now + window;
        }
        bucket.count += 1;
        Ok(Hit {
            count: bucket.count,
            resets_in: bucket.expires_at - now,
        })
    }

    async fn reset(&self, key: &str) -> Result<(), BoxError> {
        self.buckets.lock().remove(key);
        Ok(())
    }
}
