//! The dispatch loop.
//!
//! [`RelayRuntime`] sits between a transport and the [`Router`]: it
//! dispatches each update, hands the response to a [`Responder`], then runs
//! the terminate hooks of the middleware that handled it.
//!
//! ```rust,ignore
//! use relay_runtime::{RelayRuntime, config::load_config};
//!
//! let config = load_config()?;
//! let runtime = RelayRuntime::from_config(&config, router, Arc::new(MyTransport));
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(128);
//! // feed `tx` from the transport...
//! let stats = runtime.run_until_signal(rx).await;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::signal;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use relay_core::{BoxError, Response, ResponseStatus, Update};
use relay_framework::{BindingError, DispatchError, Router};

use crate::config::{RelayConfig, RuntimeConfig, UnhandledPolicy};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The transport side: sends a response back for an update.
#[async_trait]
pub trait Responder: Send + Sync + 'static {
    async fn deliver(&self, update: &Update, response: &Response) -> Result<(), BoxError>;
}

/// What happened to one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A route handled the update.
    Handled { route: String, status: ResponseStatus },
    /// A bound parameter resolved to nothing; a not-found reply was sent.
    NotFound { param: String },
    /// No route matched and the unhandled policy let it pass.
    Unhandled,
}

/// Counters reported when [`RelayRuntime::run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub handled: usize,
    pub not_found: usize,
    pub unhandled: usize,
    pub failed: usize,
    pub panicked: usize,
}

impl RuntimeStats {
    /// Total updates taken off the channel.
    pub fn total(&self) -> usize {
        self.handled + self.not_found + self.unhandled + self.failed + self.panicked
    }

    fn record(&mut self, result: Result<RuntimeResult<Outcome>, JoinError>) {
        match result {
            Ok(Ok(Outcome::Handled { .. })) => self.handled += 1,
            Ok(Ok(Outcome::NotFound { .. })) => self.not_found += 1,
            Ok(Ok(Outcome::Unhandled)) => self.unhandled += 1,
            Ok(Err(e)) => {
                error!(error = %e, "update failed");
                self.failed += 1;
            }
            Err(e) => {
                error!(error = %e, "update task panicked");
                self.panicked += 1;
            }
        }
    }
}

/// Dispatches updates through a router and delivers the results.
#[derive(Clone)]
pub struct RelayRuntime {
    router: Router,
    responder: Arc<dyn Responder>,
    config: RuntimeConfig,
}

impl RelayRuntime {
    pub fn new(router: Router, responder: Arc<dyn Responder>) -> Self {
        Self {
            router,
            responder,
            config: RuntimeConfig::default(),
        }
    }

    /// Initializes logging from `config` and creates the runtime.
    ///
    /// The router should have been built with
    /// [`RelayConfig::dispatch_config`].
    pub fn from_config(config: &RelayConfig, router: Router, responder: Arc<dyn Responder>) -> Self {
        logging::init_from_config(&config.logging);
        info!(
            log_level = %config.logging.level,
            max_concurrency = config.runtime.max_concurrency,
            routes = router.routes().len(),
            "runtime initialized from configuration"
        );
        Self::new(router, responder).with_config(config.runtime)
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Dispatches one update, delivers the response, then runs terminate
    /// hooks.
    ///
    /// Terminate hooks run only once the response counts as delivered. An
    /// empty response has nothing to send and counts as delivered; a failed
    /// delivery skips the hooks and returns the error.
    pub async fn handle(&self, update: impl Into<Arc<Update>>) -> RuntimeResult<Outcome> {
        let update = update.into();
        let dispatched = match self.router.dispatch(Arc::clone(&update)).await {
            Ok(dispatched) => dispatched,
            Err(DispatchError::Unhandled { verb, payload }) => {
                return match self.config.unhandled {
                    UnhandledPolicy::Ignore => Ok(Outcome::Unhandled),
                    UnhandledPolicy::Warn => {
                        warn!(update_id = update.id, %verb, %payload, "no route matched update");
                        Ok(Outcome::Unhandled)
                    }
                    UnhandledPolicy::Error => {
                        Err(DispatchError::Unhandled { verb, payload }.into())
                    }
                };
            }
            Err(DispatchError::Binding(BindingError::NotFound { param })) => {
                debug!(update_id = update.id, %param, "bound parameter not found");
                self.responder
                    .deliver(&update, &Response::not_found())
                    .await
                    .map_err(RuntimeError::Deliver)?;
                return Ok(Outcome::NotFound { param });
            }
            Err(e) => return Err(e.into()),
        };

        let response = dispatched.response();
        if !response.is_empty()
            && let Err(e) = self.responder.deliver(&update, response).await
        {
            debug!(update_id = update.id, "delivery failed, terminate hooks skipped");
            return Err(RuntimeError::Deliver(e));
        }

        // Failures are logged by the chain.
        let _ = dispatched.terminate().await;

        Ok(Outcome::Handled {
            route: dispatched.route().identifier().to_string(),
            status: response.status(),
        })
    }

    /// Processes updates from `rx` until the channel closes or `shutdown`
    /// fires, then waits for in-flight updates.
    ///
    /// At most `max_concurrency` updates are handled at once.
    pub async fn run(&self, mut rx: mpsc::Receiver<Update>, shutdown: CancellationToken) -> RuntimeStats {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut stats = RuntimeStats::default();

        info!(max_concurrency = self.config.max_concurrency, "dispatch loop started");
        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    drop(permit);
                    stats.record(result);
                }
                update = rx.recv() => {
                    let Some(update) = update else { break };
                    let runtime = self.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        runtime.handle(update).await
                    });
                }
            }
        }

        debug!(in_flight = tasks.len(), "draining dispatch loop");
        while let Some(result) = tasks.join_next().await {
            stats.record(result);
        }
        info!(
            handled = stats.handled,
            not_found = stats.not_found,
            unhandled = stats.unhandled,
            failed = stats.failed,
            "dispatch loop stopped"
        );
        stats
    }

    /// Like [`run`](Self::run), stopping on Ctrl+C or SIGTERM.
    pub async fn run_until_signal(&self, rx: mpsc::Receiver<Update>) -> RuntimeStats {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        let watcher = tokio::spawn(async move {
            wait_for_shutdown().await;
            trigger.cancel();
        });
        let stats = self.run(rx, shutdown).await;
        watcher.abort();
        stats
    }
}

impl std::fmt::Debug for RelayRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayRuntime")
            .field("router", &self.router)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;
    use relay_framework::prelude::*;
    use relay_framework::{MiddlewareSpec, NotFoundPolicy, RouteCollection};

    use super::*;

    struct User {
        id: u64,
    }

    impl Bindable for User {
        const PARAM: &'static str = "user";
        const ENTITY: &'static str = "users";
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(i64, Response)>>,
        fail: bool,
    }

    #[async_trait]
    impl Responder for Outbox {
        async fn deliver(&self, update: &Update, response: &Response) -> Result<(), BoxError> {
            if self.fail {
                return Err("transport down".into());
            }
            self.sent.lock().push((update.id, response.clone()));
            Ok(())
        }
    }

    struct Terminated(Arc<Mutex<Vec<i64>>>);

    #[async_trait]
    impl Middleware for Terminated {
        async fn handle(
            &self,
            req: Arc<Request>,
            next: Next,
            _args: &[String],
        ) -> Result<Response, BoxError> {
            next.run(req).await
        }

        fn is_terminable(&self) -> bool {
            true
        }

        async fn terminate(
            &self,
            req: &Request,
            _res: &Response,
            _args: &[String],
        ) -> Result<(), BoxError> {
            self.0.lock().push(req.update().id);
            Ok(())
        }
    }

    fn routes() -> RouteCollection {
        let mut r = RouteRegistrar::new();
        r.text("ping", || async { "pong" }).unwrap();
        r.text("quiet", || async {}).unwrap();
        r.add(
            RouteDefinition::text("profile {user}")
                .handler(|user: Model<User>| async move { format!("user #{}", user.id) }),
        )
        .unwrap();
        r.text("slow", || async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            "done"
        })
        .unwrap();
        r.finish().unwrap()
    }

    fn router(terminated: &Arc<Mutex<Vec<i64>>>) -> Router {
        let mut binder = Binder::new();
        binder.bind("user", |raw: String| async move {
            raw.parse::<u64>().ok().filter(|id| *id == 1).map(|id| User { id })
        });
        Router::builder(routes())
            .binder(binder.not_found(NotFoundPolicy::Abort))
            .middleware(
                MiddlewareRegistry::new().global(MiddlewareSpec::inline(
                    "terminated",
                    Terminated(Arc::clone(terminated)),
                )),
            )
            .build()
    }

    fn runtime(outbox: &Arc<Outbox>) -> (RelayRuntime, Arc<Mutex<Vec<i64>>>) {
        let terminated = Arc::new(Mutex::new(Vec::new()));
        let responder: Arc<dyn Responder> = Arc::clone(outbox) as Arc<dyn Responder>;
        (RelayRuntime::new(router(&terminated), responder), terminated)
    }

    #[tokio::test]
    async fn test_handle_delivers_then_terminates() {
        let outbox = Arc::new(Outbox::default());
        let (runtime, terminated) = runtime(&outbox);

        let outcome = runtime.handle(Update::text(7, "ping")).await.unwrap();
        assert!(matches!(outcome, Outcome::Handled { status: ResponseStatus::Ok, .. }));
        let sent = outbox.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 7);
        assert_eq!(sent[0].1.as_text(), Some("pong"));
        assert_eq!(*terminated.lock(), vec![7]);
    }

    #[tokio::test]
    async fn test_empty_response_is_not_delivered() {
        let outbox = Arc::new(Outbox::default());
        let (runtime, terminated) = runtime(&outbox);
        runtime.handle(Update::text(1, "quiet")).await.unwrap();
        assert!(outbox.sent.lock().is_empty());
        assert_eq!(*terminated.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_unhandled_policy() {
        let outbox = Arc::new(Outbox::default());
        let (runtime, _) = runtime(&outbox);
        let outcome = runtime.handle(Update::text(1, "what")).await.unwrap();
        assert_eq!(outcome, Outcome::Unhandled);

        let strict = runtime.with_config(RuntimeConfig {
            unhandled: UnhandledPolicy::Error,
            ..RuntimeConfig::default()
        });
        let err = strict.handle(Update::text(1, "what")).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Dispatch(DispatchError::Unhandled { .. })));
        assert!(outbox.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_model_replies_not_found() {
        let outbox = Arc::new(Outbox::default());
        let (runtime, terminated) = runtime(&outbox);

        let outcome = runtime.handle(Update::text(3, "profile 1")).await.unwrap();
        assert!(matches!(outcome, Outcome::Handled { .. }));

        let outcome = runtime.handle(Update::text(4, "profile 2")).await.unwrap();
        assert_eq!(outcome, Outcome::NotFound { param: "user".into() });
        let sent = outbox.sent.lock();
        assert_eq!(sent[1].1.status(), ResponseStatus::NotFound);
        // The chain never ran for the missing model.
        assert_eq!(*terminated.lock(), vec![3]);
    }

    #[tokio::test]
    async fn test_delivery_failure_skips_terminate() {
        let outbox = Arc::new(Outbox {
            fail: true,
            ..Outbox::default()
        });
        let (runtime, terminated) = runtime(&outbox);
        let err = runtime.handle(Update::text(5, "ping")).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Deliver(_)));
        assert!(terminated.lock().is_empty());

        // Nothing to send, so nothing can fail.
        runtime.handle(Update::text(6, "quiet")).await.unwrap();
        assert_eq!(*terminated.lock(), vec![6]);
    }

    #[tokio::test]
    async fn test_run_drains_until_channel_closes() {
        let outbox = Arc::new(Outbox::default());
        let (runtime, _) = runtime(&outbox);
        let runtime = runtime.with_config(RuntimeConfig {
            max_concurrency: 2,
            ..RuntimeConfig::default()
        });

        let (tx, rx) = mpsc::channel(16);
        for (id, text) in [(1, "slow"), (2, "ping"), (3, "slow"), (4, "nope"), (5, "profile 9")] {
            tx.send(Update::text(id, text)).await.unwrap();
        }
        drop(tx);

        let stats = runtime.run(rx, CancellationToken::new()).await;
        assert_eq!(stats.handled, 3);
        assert_eq!(stats.unhandled, 1);
        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.total(), 5);
        assert_eq!(outbox.sent.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let outbox = Arc::new(Outbox::default());
        let (runtime, _) = runtime(&outbox);
        let (tx, rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { runtime.run(rx, shutdown).await })
        };
        tx.send(Update::text(1, "ping")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.cancel();

        let stats = handle.await.unwrap();
        assert_eq!(stats.handled, 1);
        assert_eq!(stats.total(), 1);
    }
}
