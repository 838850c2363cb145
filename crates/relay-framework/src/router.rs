//! The update dispatcher.
//!
//! A [`Router`] owns everything a dispatch needs and is cheap to clone. One
//! dispatch runs these steps in order:
//!
//! ```text
//! Update ─▶ match route ─▶ resolve handler ─▶ bind params ─▶ build chain
//!        ─▶ middleware ... handler ─▶ Dispatched ─▶ (deliver) ─▶ terminate
//! ```
//!
//! Any step may end the dispatch with a [`DispatchError`]. Delivering the
//! response is left to the caller, which then calls
//! [`Dispatched::terminate`].
//!
//! `Router` implements `tower::Service<Update>`, so tower layers such as
//! timeouts and concurrency limits wrap it directly:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use tower::limit::ConcurrencyLimitLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(ConcurrencyLimitLayer::new(64))
//!     .service(router);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tower::Service;
use tracing::{Instrument, debug, debug_span, trace};

use relay_core::{BoxError, Response, Update};

use crate::binding::{Binder, NotFoundPolicy};
use crate::container::{Container, HandlerRegistry};
use crate::context::Request;
use crate::error::{DispatchError, GenerateError};
use crate::handler::{ErasedHandler, HandlerRef};
use crate::middleware::{Chain, MiddlewareRegistry};
use crate::routing::{Route, RouteCollection, RouteMatch};
use crate::throttle::{RateLimiter, THROTTLE_ALIAS, ThrottleRequests};

// ============================================================================
// Configuration
// ============================================================================

/// Dispatch behavior that usually comes from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Overrides the binder's not-found policy when set.
    pub not_found: Option<NotFoundPolicy>,
    /// Adds the `retry-after` meta to default throttle rejections.
    pub retry_after_hint: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            not_found: None,
            retry_after_hint: true,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

struct RouterInner {
    routes: Arc<RouteCollection>,
    middleware: MiddlewareRegistry,
    container: Arc<dyn Container>,
    binder: Binder,
    limiter: Arc<RateLimiter>,
}

/// Matches updates to routes and runs them.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn builder(routes: impl Into<Arc<RouteCollection>>) -> RouterBuilder {
        RouterBuilder::new(routes)
    }

    pub fn routes(&self) -> &Arc<RouteCollection> {
        &self.inner.routes
    }

    pub fn middleware(&self) -> &MiddlewareRegistry {
        &self.inner.middleware
    }

    pub fn container(&self) -> &Arc<dyn Container> {
        &self.inner.container
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.limiter
    }

    /// Builds the payload of the route named `name`.
    pub fn generate(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, GenerateError> {
        self.inner.routes.generate(name, params)
    }

    /// Dispatches `update` through its route.
    pub async fn dispatch(&self, update: impl Into<Arc<Update>>) -> Result<Dispatched, DispatchError> {
        self.dispatch_excluding(update, &[]).await
    }

    /// Like [`dispatch`](Self::dispatch), skipping the named global middleware
    /// for this update only.
    pub async fn dispatch_excluding(
        &self,
        update: impl Into<Arc<Update>>,
        excluded_global: &[String],
    ) -> Result<Dispatched, DispatchError> {
        let update = update.into();
        let span = debug_span!("dispatch", update_id = update.id, verb = %update.verb());
        self.run(update, excluded_global).instrument(span).await
    }

    async fn run(
        &self,
        update: Arc<Update>,
        excluded_global: &[String],
    ) -> Result<Dispatched, DispatchError> {
        let Some(RouteMatch { route, params }) = self.inner.routes.match_update(&update) else {
            debug!(payload = update.payload(), "no route matched");
            return Err(DispatchError::Unhandled {
                verb: update.verb(),
                payload: update.payload().to_string(),
            });
        };
        debug!(route = route.identifier(), fallback = route.is_fallback(), "route matched");

        let handler = self.resolve_handler(&route)?;
        let bound = self
            .inner
            .binder
            .resolve(&route, &params, handler.binding_hints())
            .await?;
        let chain = self.inner.middleware.build(&route, excluded_global)?;
        trace!(middleware = ?chain.names(), "chain built");

        let request = Arc::new(Request::new(
            update,
            route,
            params,
            bound,
            Arc::clone(&self.inner.container),
        ));
        let (result, executed) = chain.run(Arc::clone(&request), handler).await;
        let response = result.map_err(DispatchError::from_chain)?;
        debug!(status = ?response.status(), "dispatch finished");

        Ok(Dispatched {
            response,
            request,
            chain,
            executed,
        })
    }

    fn resolve_handler(&self, route: &Route) -> Result<ErasedHandler, DispatchError> {
        match route.handler() {
            HandlerRef::Inline(handler) => Ok(handler.clone()),
            reference => {
                let key = reference.key().unwrap_or_default();
                self.inner
                    .container
                    .resolve(&key)
                    .ok_or(DispatchError::HandlerNotFound(key))
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.inner.routes.len())
            .field("middleware", &self.inner.middleware)
            .field("binder", &self.inner.binder)
            .field("limiter", &self.inner.limiter)
            .finish()
    }
}

impl Service<Update> for Router {
    type Response = Dispatched;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Dispatched, DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, update: Update) -> Self::Future {
        let router = self.clone();
        async move { router.dispatch(update).await }.boxed()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Router`].
pub struct RouterBuilder {
    routes: Arc<RouteCollection>,
    middleware: MiddlewareRegistry,
    container: Arc<dyn Container>,
    binder: Binder,
    limiter: Arc<RateLimiter>,
    config: DispatchConfig,
}

impl RouterBuilder {
    pub fn new(routes: impl Into<Arc<RouteCollection>>) -> Self {
        Self {
            routes: routes.into(),
            middleware: MiddlewareRegistry::new(),
            container: Arc::new(HandlerRegistry::new()),
            binder: Binder::new(),
            limiter: Arc::new(RateLimiter::new()),
            config: DispatchConfig::default(),
        }
    }

    pub fn middleware(mut self, registry: MiddlewareRegistry) -> Self {
        self.middleware = registry;
        self
    }

    pub fn container(self, container: impl Container) -> Self {
        self.container_arc(Arc::new(container))
    }

    pub fn container_arc(mut self, container: Arc<dyn Container>) -> Self {
        self.container = container;
        self
    }

    pub fn binder(mut self, binder: Binder) -> Self {
        self.binder = binder;
        self
    }

    pub fn limiter(self, limiter: RateLimiter) -> Self {
        self.limiter_arc(Arc::new(limiter))
    }

    pub fn limiter_arc(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Finishes the router.
    ///
    /// Registers [`ThrottleRequests`] under `throttle` unless that alias is
    /// already taken.
    pub fn build(self) -> Router {
        let mut middleware = self.middleware;
        if !middleware.has_alias(THROTTLE_ALIAS) {
            let throttle = ThrottleRequests::new(Arc::clone(&self.limiter))
                .retry_after_hint(self.config.retry_after_hint);
            middleware = middleware.alias(THROTTLE_ALIAS, throttle);
        }
        let binder = match self.config.not_found {
            Some(policy) => self.binder.not_found(policy),
            None => self.binder,
        };
        Router {
            inner: Arc::new(RouterInner {
                routes: self.routes,
                middleware,
                container: self.container,
                binder,
                limiter: self.limiter,
            }),
        }
    }
}

// ============================================================================
// Dispatched
// ============================================================================

/// A finished dispatch, waiting to be delivered and terminated.
pub struct Dispatched {
    response: Response,
    request: Arc<Request>,
    chain: Chain,
    executed: Vec<usize>,
}

impl Dispatched {
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    pub fn route(&self) -> &Arc<Route> {
        self.request.route()
    }

    /// Names of the middleware that ran, in execution order.
    pub fn executed_middleware(&self) -> Vec<String> {
        let names = self.chain.names();
        self.executed
            .iter()
            .filter_map(|&i| names.get(i).cloned())
            .collect()
    }

    /// Runs the terminate hooks of the middleware that ran.
    ///
    /// Call this after the response has been delivered. Failures are logged
    /// and returned.
    pub async fn terminate(&self) -> Vec<(String, BoxError)> {
        self.chain
            .terminate(&self.request, &self.response, &self.executed)
            .await
    }
}

impl fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatched")
            .field("route", &self.request.route().identifier())
            .field("response", &self.response)
            .field("executed", &self.executed_middleware())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    use relay_core::{ResponseStatus, Verb};
    use relay_macros::{Bindable, RouteEnum};

    use super::*;
    use crate::error::{BindingError, ExtractError};
    use crate::extractor::{EnumParam, Model, Path};
    use crate::middleware::{Middleware, Next, from_fn};
    use crate::routing::{GroupAttributes, RouteDefinition, RouteRegistrar};
    use crate::throttle::Limit;

    #[derive(Debug, Bindable)]
    #[bind(param = "user")]
    struct User {
        id: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq, RouteEnum)]
    #[route(param = "topic")]
    enum Topic {
        News,
        #[route(rename = "dev-log")]
        DevLog,
    }

    type Log = Arc<Mutex<Vec<String>>>;

    struct Audit(Log);

    #[async_trait]
    impl Middleware for Audit {
        async fn handle(
            &self,
            req: Arc<Request>,
            next: Next,
            _args: &[String],
        ) -> Result<Response, BoxError> {
            self.0.lock().push(format!("audit {}", req.route().identifier()));
            next.run(req).await
        }

        fn is_terminable(&self) -> bool {
            true
        }

        async fn terminate(
            &self,
            _req: &Request,
            res: &Response,
            _args: &[String],
        ) -> Result<(), BoxError> {
            self.0
                .lock()
                .push(format!("terminate {}", res.as_text().unwrap_or_default()));
            Ok(())
        }
    }

    fn app(log: &Log) -> Router {
        let mut r = RouteRegistrar::new();
        r.pattern("id", "[0-9]+").unwrap();
        r.add(
            RouteDefinition::command("/start")
                .name("start")
                .handler(|| async { "welcome" }),
        )
        .unwrap();
        r.group(
            GroupAttributes::new()
                .prefix("/admin/")
                .name("admin.")
                .middleware("audit")
                .controller("AdminController"),
            |r| {
                r.add(RouteDefinition::command("ban {id}").name("ban").uses("ban"))?;
                r.add(
                    RouteDefinition::command("say {text}")
                        .handler(|Path(text): Path<String>| async move { text }),
                )?;
                Ok(())
            },
        )
        .unwrap();
        r.add(
            RouteDefinition::text("profile {user}")
                .handler(|user: Model<User>| async move { format!("user #{}", user.id) }),
        )
        .unwrap();
        r.add(
            RouteDefinition::text("topic {topic}").handler(|EnumParam(topic): EnumParam<Topic>| async move {
                format!("{topic:?}")
            }),
        )
        .unwrap();
        r.add(
            RouteDefinition::text("upload")
                .middleware("throttle:uploads")
                .handler(|| async { "uploaded" }),
        )
        .unwrap();
        r.add(RouteDefinition::text("broken").named("missing")).unwrap();
        r.add(RouteDefinition::text("guarded").middleware("nope").handler(|| async {}))
            .unwrap();
        r.add(
            RouteDefinition::text("count {n}")
                .handler(|Path(n): Path<u32>| async move { n.to_string() }),
        )
        .unwrap();
        let routes = r.finish().unwrap();

        let container = HandlerRegistry::new().action(
            "AdminController",
            "ban",
            |Path(id): Path<u64>| async move { format!("banned {id}") },
        );

        let mut binder = Binder::new().not_found(NotFoundPolicy::Abort);
        binder.bind("user", |raw: String| async move {
            raw.parse::<u64>().ok().filter(|id| *id < 100).map(|id| User { id })
        });

        let mut limiter = RateLimiter::new();
        limiter.define("uploads", |req: &Request| {
            Limit::per_minute(1).by(req.update().sender_id().unwrap_or_default())
        });

        let log = Arc::clone(log);
        let middleware = MiddlewareRegistry::new()
            .alias("audit", Audit(Arc::clone(&log)))
            .alias(
                "stamp",
                from_fn(|req: Arc<Request>, next: Next| async move {
                    let mut res = next.run(req).await?;
                    res.set_meta("stamped", "yes");
                    Ok(res)
                }),
            )
            .global("stamp");

        Router::builder(routes)
            .middleware(middleware)
            .container(container)
            .binder(binder)
            .limiter(limiter)
            .build()
    }

    #[tokio::test]
    async fn test_dispatch_inline_route() {
        let router = app(&Log::default());
        let done = router.dispatch(Update::text(1, "/start")).await.unwrap();
        assert_eq!(done.response().as_text(), Some("welcome"));
        assert_eq!(done.response().meta("stamped"), Some("yes"));
        assert_eq!(done.route().name(), Some("start"));
    }

    #[tokio::test]
    async fn test_dispatch_controller_action_in_group() {
        let log = Log::default();
        let router = app(&log);
        let done = router.dispatch(Update::text(1, "/admin/ban 42")).await.unwrap();
        assert_eq!(done.response().as_text(), Some("banned 42"));
        assert_eq!(done.executed_middleware(), vec!["stamp", "audit"]);
        assert!(done.terminate().await.is_empty());
        assert_eq!(
            *log.lock(),
            vec!["audit admin.ban".to_string(), "terminate banned 42".to_string()]
        );
    }

    #[tokio::test]
    async fn test_constraint_failure_is_unhandled() {
        let router = app(&Log::default());
        let err = router.dispatch(Update::text(1, "/admin/ban bob")).await.unwrap_err();
        assert!(err.is_unhandled());
    }

    #[tokio::test]
    async fn test_fallback_catches_the_rest() {
        let mut r = RouteRegistrar::new();
        r.text("ping", || async { "pong" }).unwrap();
        r.fallback(|| async { "what?" }).unwrap();
        let router = Router::builder(r.finish().unwrap()).build();

        let done = router.dispatch(Update::text(1, "ping")).await.unwrap();
        assert_eq!(done.response().as_text(), Some("pong"));
        let done = router.dispatch(Update::callback(2, "anything")).await.unwrap();
        assert_eq!(done.response().as_text(), Some("what?"));
    }

    #[tokio::test]
    async fn test_unhandled_reports_verb_and_payload() {
        let router = app(&Log::default());
        match router.dispatch(Update::inline(1, "cats")).await {
            Err(DispatchError::Unhandled { verb, payload }) => {
                assert_eq!(verb, Verb::InlineQuery);
                assert_eq!(payload, "cats");
            }
            other => panic!("expected unhandled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_binding() {
        let router = app(&Log::default());
        let done = router.dispatch(Update::text(1, "profile 7")).await.unwrap();
        assert_eq!(done.response().as_text(), Some("user #7"));

        let err = router.dispatch(Update::text(1, "profile 700")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Binding(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_null_policy_reaches_handler_as_extract_error() {
        let log = Log::default();
        let router = app(&log);
        let config = DispatchConfig {
            not_found: Some(NotFoundPolicy::Null),
            ..DispatchConfig::default()
        };
        let router = Router::builder(Arc::clone(router.routes()))
            .binder({
                let mut binder = Binder::new();
                binder.bind("user", |_raw: String| async move { None::<User> });
                binder
            })
            .config(config)
            .build();
        let err = router.dispatch(Update::text(1, "profile 7")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Extract(ExtractError::NotBound(_))));
    }

    #[tokio::test]
    async fn test_enum_binding() {
        let router = app(&Log::default());
        let done = router.dispatch(Update::text(1, "topic dev-log")).await.unwrap();
        assert_eq!(done.response().as_text(), Some("DevLog"));

        let err = router.dispatch(Update::text(1, "topic sports")).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Binding(BindingError::NotFound { ref param }) if param == "topic"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_alias_is_registered() {
        let router = app(&Log::default());
        let update = Update::text(1, "upload").from_user(3);
        let done = router.dispatch(update.clone()).await.unwrap();
        assert_eq!(done.response().as_text(), Some("uploaded"));
        let done = router.dispatch(update).await.unwrap();
        assert_eq!(done.response().status(), ResponseStatus::TooManyAttempts);
        assert_eq!(done.response().meta("stamped"), Some("yes"));
    }

    #[tokio::test]
    async fn test_resolution_errors() {
        let router = app(&Log::default());
        assert!(matches!(
            router.dispatch(Update::text(1, "broken")).await,
            Err(DispatchError::HandlerNotFound(ref key)) if key == "missing"
        ));
        assert!(matches!(
            router.dispatch(Update::text(1, "guarded")).await,
            Err(DispatchError::UnknownMiddleware(ref name)) if name == "nope"
        ));
    }

    #[tokio::test]
    async fn test_extract_failure() {
        let router = app(&Log::default());
        let err = router
            .dispatch(Update::text(1, "count many"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Extract(ExtractError::InvalidParam { .. })));
    }

    #[tokio::test]
    async fn test_excluding_global_middleware() {
        let router = app(&Log::default());
        let done = router
            .dispatch_excluding(Update::text(1, "/start"), &["stamp".to_string()])
            .await
            .unwrap();
        assert_eq!(done.response().meta("stamped"), None);
        assert!(done.executed_middleware().is_empty());
    }

    #[tokio::test]
    async fn test_tower_service() {
        let router = app(&Log::default());
        let done = router.oneshot(Update::text(1, "/start")).await.unwrap();
        assert_eq!(done.response().as_text(), Some("welcome"));
    }

    #[test]
    fn test_service_is_always_ready() {
        let mut router = app(&Log::default());
        let mut task = tokio_test::task::spawn(());
        tokio_test::assert_ready_ok!(task.enter(|cx, _| router.poll_ready(cx)));
    }

    #[test]
    fn test_generate_through_router() {
        let router = app(&Log::default());
        let params = BTreeMap::from([("id".to_string(), "5".to_string())]);
        assert_eq!(router.generate("admin.ban", &params).unwrap(), "/admin/ban 5");
    }
}
