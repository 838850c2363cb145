use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::limit::{Limit, Limits};
use super::store::{MemoryStore, RateLimitStore};
use crate::context::Request;
use crate::error::{RateLimitExceeded, RateLimited, ThrottleError};

type LimiterFn = Arc<dyn Fn(&Request) -> Limits + Send + Sync>;

/// The decision for one limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u64 },
    Exceeded { retry_after: std::time::Duration },
}

/// Named limiters over a shared counter store.
///
/// ```rust,ignore
/// let mut limiter = RateLimiter::new();
/// limiter.define("uploads", |req| {
///     Limit::per_minute(3).by(req.update().sender_id().unwrap_or_default())
/// });
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    limiters: HashMap<String, LimiterFn>,
    store: Arc<dyn RateLimitStore>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// A limiter backed by an in-process [`MemoryStore`].
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            limiters: HashMap::new(),
            store,
        }
    }

    /// Defines (or replaces) the limiter `name`.
    ///
    /// Every limit returned for one request is counted in the bucket
    /// `name:key`. Limits that share a key (or have none) share one counter,
    /// so give each window of a multi-limit limiter its own [`Limit::by`].
    pub fn define<F, L>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Request) -> L + Send + Sync + 'static,
        L: Into<Limits>,
    {
        let f: LimiterFn = Arc::new(move |req: &Request| f(req).into());
        self.limiters.insert(name.into(), f);
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.limiters.contains_key(name)
    }

    /// Evaluates the limiter `name` for `req`.
    pub fn resolve(&self, name: &str, req: &Request) -> Option<Vec<Limit>> {
        self.limiters.get(name).map(|f| f(req).0)
    }

    /// The bucket key for `limit` under the limiter `name`: `name:key`, or
    /// just `name` without a key.
    pub fn bucket_key(name: &str, limit: &Limit) -> String {
        match &limit.key {
            Some(key) => format!("{name}:{key}"),
            None => name.to_string(),
        }
    }

    /// Counts one hit against `limit` in bucket `key`.
    pub async fn check(&self, limit: &Limit, key: &str) -> Result<Decision, ThrottleError> {
        if limit.is_unlimited() {
            return Ok(Decision::Allowed {
                remaining: u64::MAX,
            });
        }
        let hit = self
            .store
            .increment(key, limit.decay)
            .await
            .map_err(ThrottleError::Store)?;
        trace!(key, count = hit.count, max = limit.max_attempts, "rate limit hit");
        if hit.count > limit.max_attempts {
            Ok(Decision::Exceeded {
                retry_after: hit.resets_in,
            })
        } else {
            Ok(Decision::Allowed {
                remaining: limit.max_attempts - hit.count,
            })
        }
    }

    /// Counts one hit against every limit of `name`, in order.
    ///
    /// The first exceeded limit rejects; later limits are not counted.
    pub async fn attempt(&self, name: &str, req: &Request) -> Result<(), RateLimited> {
        let limits = self
            .resolve(name, req)
            .ok_or_else(|| ThrottleError::UnknownLimiter(name.to_string()))?;
        self.attempt_limits(name, &limits).await
    }

    /// Like [`attempt`](Self::attempt) with already resolved limits.
    pub async fn attempt_limits(&self, name: &str, limits: &[Limit]) -> Result<(), RateLimited> {
        for (index, limit) in limits.iter().enumerate() {
            let key = Self::bucket_key(name, limit);
            if let Decision::Exceeded { retry_after } = self.check(limit, &key).await? {
                debug!(key, retry_after = retry_after.as_secs(), "rate limit exceeded");
                return Err(RateLimitExceeded {
                    key,
                    limit_index: index,
                    retry_after,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Clears the bucket `key`.
    pub async fn clear(&self, key: &str) -> Result<(), ThrottleError> {
        self.store.reset(key).await.map_err(ThrottleError::Store)
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.limiters.keys().collect();
        names.sort();
        f.debug_struct("RateLimiter")
            .field("limiters", &names)
            .finish_non_exhaustive()
    }
}
