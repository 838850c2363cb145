//! Middleware pipeline.
//!
//! The chain for a request is built from the global list, the route's group
//! middleware and its own middleware, in that order. Group names expand to
//! their members, excluded names are removed, the priority list reorders what
//! it knows about, and exact duplicates are dropped:
//!
//! ```text
//! global ─┐
//! groups ─┼─▶ expand ─▶ exclude ─▶ sort by priority ─▶ dedupe ─▶ Chain
//! route  ─┘
//! ```
//!
//! Each middleware receives the request and a [`Next`] continuation. Not
//! calling `next.run(req)` short-circuits the chain with the middleware's own
//! response. After the response has been delivered, terminable middleware that
//! actually ran get their `terminate` hook, in execution order.

mod pipeline;
mod priority;
mod registry;
mod spec;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use relay_core::{BoxError, Response};

use crate::context::Request;

pub use pipeline::{Chain, Next, ResolvedMiddleware};
pub use priority::sort_by_priority;
pub use registry::MiddlewareRegistry;
pub use spec::{InlineMiddleware, MiddlewareRef, MiddlewareSpec};

/// A unit of request processing wrapped around the handler.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Processes the request, usually by calling `next.run(req)`.
    ///
    /// `args` are the arguments from the `name:a,b` reference.
    async fn handle(
        &self,
        req: Arc<Request>,
        next: Next,
        args: &[String],
    ) -> Result<Response, BoxError>;

    /// Returns `true` if [`terminate`](Self::terminate) should be called after
    /// the response is delivered.
    fn is_terminable(&self) -> bool {
        false
    }

    /// Runs after the response has been delivered.
    async fn terminate(
        &self,
        _req: &Request,
        _res: &Response,
        _args: &[String],
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Middleware built from an async function via [`from_fn`].
pub struct FromFn<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

/// Creates middleware from an async function.
///
/// ```rust,ignore
/// let log = middleware::from_fn(|req: Arc<Request>, next: Next| async move {
///     tracing::info!(update = req.update().id, "handling");
///     next.run(req).await
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FromFn<F, Fut>
where
    F: Fn(Arc<Request>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    FromFn {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> Middleware for FromFn<F, Fut>
where
    F: Fn(Arc<Request>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
{
    async fn handle(
        &self,
        req: Arc<Request>,
        next: Next,
        _args: &[String],
    ) -> Result<Response, BoxError> {
        (self.f)(req, next).await
    }
}
