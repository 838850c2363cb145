//! Rate limiting.
//!
//! Named limiters map a request to one or more [`Limit`]s. Each limit counts
//! hits in a fixed window, in a bucket keyed by the limiter name and the
//! limit's partition key. Limits are checked in declaration order and the
//! first exceeded one rejects the request.
//!
//! The [`ThrottleRequests`] middleware applies a limiter to routes under the
//! `throttle` alias.

mod limit;
mod limiter;
mod middleware;
mod store;

pub use limit::{Limit, Limits};
pub use limiter::{Decision, RateLimiter};
pub use middleware::ThrottleRequests;
pub use store::{Hit, MemoryStore, RateLimitStore};

/// The alias the throttle middleware is registered under.
pub const THROTTLE_ALIAS: &str = "throttle";
