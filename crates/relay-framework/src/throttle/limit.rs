use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use relay_core::Response;

use crate::context::Request;
use crate::error::RateLimitExceeded;

type ExceededResponder = Arc<dyn Fn(&Request, &RateLimitExceeded) -> Response + Send + Sync>;

/// One rate limit: at most `max_attempts` hits per `decay` window.
///
/// ```rust,ignore
/// Limit::per_minute(3).by(user_id.to_string())
/// Limit::per_minutes(10, 50).response(|_, e| Response::text("slow down"))
/// ```
#[derive(Clone)]
#[must_use]
pub struct Limit {
    pub max_attempts: u64,
    pub decay: Duration,
    /// Partition key. Without one, every request shares the limiter's bucket.
    pub key: Option<String>,
    responder: Option<ExceededResponder>,
}

impl Limit {
    pub fn new(max_attempts: u64, decay: Duration) -> Self {
        Self {
            max_attempts,
            decay,
            key: None,
            responder: None,
        }
    }

    pub fn per_second(max_attempts: u64) -> Self {
        Self::new(max_attempts, Duration::from_secs(1))
    }

    pub fn per_minute(max_attempts: u64) -> Self {
        Self::new(max_attempts, Duration::from_secs(60))
    }

    pub fn per_minutes(decay_minutes: u64, max_attempts: u64) -> Self {
        Self::new(max_attempts, Duration::from_secs(decay_minutes * 60))
    }

    pub fn per_hour(max_attempts: u64) -> Self {
        Self::new(max_attempts, Duration::from_secs(60 * 60))
    }

    pub fn per_day(max_attempts: u64) -> Self {
        Self::new(max_attempts, Duration::from_secs(24 * 60 * 60))
    }

    /// A limit that never rejects.
    pub fn none() -> Self {
        Self::new(u64::MAX, Duration::ZERO)
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_attempts == u64::MAX
    }

    /// Partitions the limit by `key`.
    ///
    /// Two limits of one limiter with the same key count in the same bucket.
    pub fn by(mut self, key: impl fmt::Display) -> Self {
        self.key = Some(key.to_string());
        self
    }

    /// Overrides the response sent when this limit is exceeded.
    pub fn response<F>(mut self, responder: F) -> Self
    where
        F: Fn(&Request, &RateLimitExceeded) -> Response + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Builds the custom response, if one is set.
    pub fn exceeded_response(&self, req: &Request, err: &RateLimitExceeded) -> Option<Response> {
        self.responder.as_ref().map(|f| f(req, err))
    }
}

impl fmt::Debug for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Limit")
            .field("max_attempts", &self.max_attempts)
            .field("decay", &self.decay)
            .field("key", &self.key)
            .field("custom_response", &self.responder.is_some())
            .finish()
    }
}

/// What a limiter callback returns: one limit or several.
#[derive(Debug, Clone, Default)]
pub struct Limits(pub Vec<Limit>);

impl From<Limit> for Limits {
    fn from(limit: Limit) -> Self {
        Self(vec![limit])
    }
}

impl From<Vec<Limit>> for Limits {
    fn from(limits: Vec<Limit>) -> Self {
        Self(limits)
    }
}

impl<const N: usize> From<[Limit; N]> for Limits {
    fn from(limits: [Limit; N]) -> Self {
        Self(limits.into())
    }
}
