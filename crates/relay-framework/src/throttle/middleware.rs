use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use relay_core::{BoxError, Response};

use super::limit::Limit;
use super::limiter::RateLimiter;
use crate::context::Request;
use crate::error::{RateLimited, ThrottleError};
use crate::middleware::{Middleware, Next};

/// The `throttle` middleware.
///
/// Arguments select the limits:
///
/// ```text
/// throttle:uploads      → the named limiter "uploads"
/// throttle:60           → 60 attempts per minute, per sender
/// throttle:5,10         → 5 attempts per 10 minutes, per sender
/// ```
#[derive(Debug, Clone)]
pub struct ThrottleRequests {
    limiter: Arc<RateLimiter>,
    retry_after_hint: bool,
}

impl ThrottleRequests {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            retry_after_hint: true,
        }
    }

    /// Controls whether the default rejection carries the `retry-after` meta.
    pub fn retry_after_hint(mut self, enabled: bool) -> Self {
        self.retry_after_hint = enabled;
        self
    }

    fn limits_for(&self, req: &Request, args: &[String]) -> Result<(String, Vec<Limit>), ThrottleError> {
        if let [name] = args
            && self.limiter.has(name)
        {
            let limits = self
                .limiter
                .resolve(name, req)
                .ok_or_else(|| ThrottleError::UnknownLimiter(name.clone()))?;
            return Ok((name.clone(), limits));
        }

        let parse = |s: &String| s.parse::<u64>().ok();
        let (max, minutes) = match args {
            [max] => (parse(max), Some(1)),
            [max, minutes] => (parse(max), parse(minutes)),
            _ => (None, None),
        };
        let (Some(max), Some(minutes)) = (max, minutes) else {
            return Err(match args {
                [name] if parse(name).is_none() => ThrottleError::UnknownLimiter(name.clone()),
                _ => ThrottleError::InvalidArguments(args.to_vec()),
            });
        };

        let name = format!("throttle:{}", req.route().identifier());
        let limit = Limit::per_minutes(minutes, max).by(requester(req));
        Ok((name, vec![limit]))
    }
}

/// The partition key for anonymous throttles: the sender, else the chat.
fn requester(req: &Request) -> String {
    let update = req.update();
    match (update.sender_id(), update.chat_id()) {
        (Some(user), _) => format!("user:{user}"),
        (None, Some(chat)) => format!("chat:{chat}"),
        (None, None) => "anonymous".to_string(),
    }
}

#[async_trait]
impl Middleware for ThrottleRequests {
    async fn handle(
        &self,
        req: Arc<Request>,
        next: Next,
        args: &[String],
    ) -> Result<Response, BoxError> {
        let (name, limits) = self.limits_for(&req, args)?;
        match self.limiter.attempt_limits(&name, &limits).await {
            Ok(()) => next.run(req).await,
            Err(RateLimited::Exceeded(exceeded)) => {
                debug!(
                    key = %exceeded.key,
                    retry_after = exceeded.retry_after.as_secs(),
                    "request throttled"
                );
                let custom = limits
                    .get(exceeded.limit_index)
                    .and_then(|limit| limit.exceeded_response(&req, &exceeded));
                Ok(custom.unwrap_or_else(|| {
                    let secs = exceeded.retry_after.as_secs_f64().ceil() as u64;
                    let res = Response::too_many_attempts(secs);
                    if self.retry_after_hint {
                        res
                    } else {
                        Response::text(res.as_text().unwrap_or_default())
                            .with_status(res.status())
                    }
                }))
            }
            Err(RateLimited::Throttle(e)) => {
                warn!("throttle failed: {e}");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use relay_core::{RETRY_AFTER, ResponseStatus, Update};

    use super::*;
    use crate::context::testing::request_for;
    use crate::handler::into_handler;
    use crate::middleware::{Chain, ResolvedMiddleware};

    async fn run(
        throttle: &ThrottleRequests,
        req: &Arc<Request>,
        args: &[&str],
    ) -> Result<Response, BoxError> {
        let chain = Chain::new(vec![ResolvedMiddleware {
            name: "throttle".into(),
            middleware: Arc::new(throttle.clone()),
            args: args.iter().map(|s| s.to_string()).collect(),
        }]);
        chain
            .run(Arc::clone(req), into_handler(|| async { "ok" }))
            .await
            .0
    }

    #[tokio::test(start_paused = true)]
    async fn test_anonymous_limit() {
        let throttle = ThrottleRequests::new(Arc::new(RateLimiter::new()));
        let req = Arc::new(request_for("upload", Update::text(1, "upload").from_user(9)));
        for _ in 0..3 {
            let res = run(&throttle, &req, &["3", "1"]).await.unwrap();
            assert_eq!(res.as_text(), Some("ok"));
        }
        let res = run(&throttle, &req, &["3", "1"]).await.unwrap();
        assert_eq!(res.status(), ResponseStatus::TooManyAttempts);
        assert_eq!(res.meta(RETRY_AFTER), Some("60"));

        tokio::time::advance(Duration::from_secs(60)).await;
        let res = run(&throttle, &req, &["3", "1"]).await.unwrap();
        assert_eq!(res.as_text(), Some("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_named_limiter_with_custom_response() {
        let mut limiter = RateLimiter::new();
        limiter.define("uploads", |_: &Request| {
            Limit::per_minute(1).response(|_, e| Response::rejected(format!("wait {}s", e.retry_after.as_secs())))
        });
        let throttle = ThrottleRequests::new(Arc::new(limiter));
        let req = Arc::new(request_for("upload", Update::text(1, "upload")));
        run(&throttle, &req, &["uploads"]).await.unwrap();
        let res = run(&throttle, &req, &["uploads"]).await.unwrap();
        assert_eq!(res.as_text(), Some("wait 60s"));
        assert_eq!(res.status(), ResponseStatus::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hint_can_be_disabled() {
        let throttle = ThrottleRequests::new(Arc::new(RateLimiter::new())).retry_after_hint(false);
        let req = Arc::new(request_for("go", Update::text(1, "go")));
        run(&throttle, &req, &["1"]).await.unwrap();
        let res = run(&throttle, &req, &["1"]).await.unwrap();
        assert_eq!(res.status(), ResponseStatus::TooManyAttempts);
        assert_eq!(res.meta(RETRY_AFTER), None);
    }

    #[tokio::test]
    async fn test_bad_arguments() {
        let throttle = ThrottleRequests::new(Arc::new(RateLimiter::new()));
        let req = Arc::new(request_for("go", Update::text(1, "go")));
        let err = run(&throttle, &req, &["missing"]).await.unwrap_err();
        assert!(err.to_string().contains("not defined"));
        let err = run(&throttle, &req, &["1", "x"]).await.unwrap_err();
        assert!(err.to_string().contains("invalid throttle arguments"));
    }
}
