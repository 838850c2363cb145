use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{error, trace};

use relay_core::{BoxError, Response};

use super::Middleware;
use crate::context::Request;
use crate::handler::ErasedHandler;

/// A middleware resolved for one chain, with its arguments.
#[derive(Clone)]
pub struct ResolvedMiddleware {
    pub name: String,
    pub middleware: Arc<dyn Middleware>,
    pub args: Vec<String>,
}

impl fmt::Debug for ResolvedMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedMiddleware")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// The ordered middleware chain for one request.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    entries: Arc<[ResolvedMiddleware]>,
}

impl Chain {
    pub fn new(entries: Vec<ResolvedMiddleware>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Middleware names in execution order, with arguments.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|m| {
                if m.args.is_empty() {
                    m.name.clone()
                } else {
                    format!("{}:{}", m.name, m.args.join(","))
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the chain around `endpoint`.
    ///
    /// Returns the result together with the indices of the middleware that
    /// were entered, in execution order.
    pub async fn run(
        &self,
        req: Arc<Request>,
        endpoint: ErasedHandler,
    ) -> (Result<Response, BoxError>, Vec<usize>) {
        let executed = Arc::new(Mutex::new(Vec::with_capacity(self.entries.len())));
        let next = Next {
            entries: Arc::clone(&self.entries),
            index: 0,
            endpoint,
            executed: Arc::clone(&executed),
        };
        let result = next.run(req).await;
        let executed = std::mem::take(&mut *executed.lock());
        (result, executed)
    }

    /// Calls `terminate` on every terminable middleware in `executed`, in
    /// order. Failures are logged and returned; they never stop later hooks.
    pub async fn terminate(
        &self,
        req: &Request,
        res: &Response,
        executed: &[usize],
    ) -> Vec<(String, BoxError)> {
        let mut failures = Vec::new();
        for entry in executed.iter().filter_map(|&i| self.entries.get(i)) {
            if !entry.middleware.is_terminable() {
                continue;
            }
            trace!(middleware = %entry.name, "terminate");
            if let Err(e) = entry.middleware.terminate(req, res, &entry.args).await {
                error!(middleware = %entry.name, "terminate hook failed: {e}");
                failures.push((entry.name.clone(), e));
            }
        }
        failures
    }
}

/// The continuation handed to a middleware.
pub struct Next {
    entries: Arc<[ResolvedMiddleware]>,
    index: usize,
    endpoint: ErasedHandler,
    executed: Arc<Mutex<Vec<usize>>>,
}

impl Next {
    /// Passes the request to the rest of the chain.
    pub fn run(self, req: Arc<Request>) -> BoxFuture<'static, Result<Response, BoxError>> {
        async move {
            let Some(entry) = self.entries.get(self.index).cloned() else {
                return self.endpoint.call(req).await;
            };
            self.executed.lock().push(self.index);
            trace!(middleware = %entry.name, index = self.index, "enter");
            let next = Next {
                entries: Arc::clone(&self.entries),
                index: self.index + 1,
                endpoint: self.endpoint.clone(),
                executed: Arc::clone(&self.executed),
            };
            entry.middleware.handle(req, next, &entry.args).await
        }
        .boxed()
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining", &self.entries.len().saturating_sub(self.index))
            .finish_non_exhaustive()
    }
}
