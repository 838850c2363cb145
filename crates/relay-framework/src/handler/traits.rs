//! The [`Handler`] trait and its blanket implementations.
//!
//! Handlers are implemented via blanket implementations for async functions of
//! up to 16 arguments, in the style of Axum. Each argument is extracted from the
//! [`Request`] with [`FromContext`]; an extraction failure aborts the call with
//! that error.
//!
//! The argument types also tell the binder which route parameters need
//! resolving: every extractor may publish a [`BindingHint`], and the hints are
//! collected once when the handler is erased.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use relay_core::{BoxError, Response};

use super::IntoResponse;
use crate::binding::BindingHint;
use crate::context::Request;
use crate::extractor::FromContext;

/// The future returned by a type-erased handler.
pub type HandlerFuture = BoxFuture<'static, Result<Response, BoxError>>;

/// The core trait for route handlers.
///
/// # Blanket Implementation
///
/// This trait is automatically implemented for async functions that:
/// - Take 0-16 parameters that implement [`FromContext`]
/// - Return a type that implements [`IntoResponse`]
///
/// ```rust,ignore
/// async fn ping() -> &'static str { "pong" }
///
/// async fn show(Path((id,)): Path<(u64,)>) -> anyhow::Result<String> {
///     Ok(format!("user {id}"))
/// }
/// ```
#[async_trait]
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// Call the handler with the given request.
    async fn call(self, req: Arc<Request>) -> Result<Response, BoxError>;

    /// The binding hints published by this handler's arguments.
    fn binding_hints(&self) -> Vec<BindingHint>;
}

/// A type-erased handler that can be stored on routes and in containers.
#[derive(Clone)]
pub struct ErasedHandler {
    call: Arc<dyn Fn(Arc<Request>) -> HandlerFuture + Send + Sync>,
    hints: Arc<[BindingHint]>,
}

impl ErasedHandler {
    /// Invokes the handler.
    pub fn call(&self, req: Arc<Request>) -> HandlerFuture {
        (self.call)(req)
    }

    /// The parameters this handler wants bound, in argument order.
    pub fn binding_hints(&self) -> &[BindingHint] {
        &self.hints
    }

    /// Returns `true` if both values wrap the same handler instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for ErasedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedHandler")
            .field("hints", &self.hints)
            .finish_non_exhaustive()
    }
}

/// Convert a handler function into an erased handler.
pub fn into_handler<F, T>(f: F) -> ErasedHandler
where
    F: Handler<T>,
    T: 'static,
{
    let hints: Arc<[BindingHint]> = f.binding_hints().into();
    ErasedHandler {
        call: Arc::new(move |req| f.clone().call(req)),
        hints,
    }
}

// ============================================================================
// Handler implementations for functions (Axum-style)
// ============================================================================

/// Macro to generate Handler implementations for functions with different arities.
macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables)]
        #[async_trait]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoResponse + 'static,
            $( $ty: FromContext + Send + 'static, )*
        {
            async fn call(self, req: Arc<Request>) -> Result<Response, BoxError> {
                $(
                    let $ty = $ty::from_context(&req)?;
                )*

                (self)($($ty,)*).await.into_response()
            }

            fn binding_hints(&self) -> Vec<BindingHint> {
                let hints: Vec<Option<BindingHint>> = vec![$( $ty::binding_hint(), )*];
                hints.into_iter().flatten().collect()
            }
        }
    };
}

// Generate implementations for 0-16 parameters
impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);
