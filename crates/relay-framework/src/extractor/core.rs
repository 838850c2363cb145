use std::sync::Arc;

use relay_core::Update;

use crate::binding::BindingHint;
use crate::context::Request;
use crate::error::ExtractResult;
use crate::routing::RouteParams;

/// A trait for types that can be extracted from a [`Request`].
///
/// Types implementing this trait can be used directly as handler function
/// parameters.
///
/// # Binding
///
/// Extractors that need a route parameter resolved before the handler runs
/// return a [`BindingHint`] from [`binding_hint`](Self::binding_hint). The
/// hint is read once when the handler is registered.
pub trait FromContext: Sized {
    /// Attempts to extract this type from the given request.
    fn from_context(req: &Request) -> ExtractResult<Self>;

    /// The parameter this extractor wants bound, if any.
    fn binding_hint() -> Option<BindingHint> {
        None
    }
}

impl FromContext for Arc<Update> {
    fn from_context(req: &Request) -> ExtractResult<Self> {
        Ok(Arc::clone(req.update()))
    }
}

impl FromContext for RouteParams {
    fn from_context(req: &Request) -> ExtractResult<Self> {
        Ok(req.params().clone())
    }
}

/// Implementation for `Option<T>` where `T: FromContext`.
///
/// This allows handlers to have optional parameters that may or may not
/// be extractable from the request. The inner hint is kept, so an
/// `Option<Model<T>>` still asks for binding.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(req: &Request) -> ExtractResult<Self> {
        Ok(T::from_context(req).ok())
    }

    fn binding_hint() -> Option<BindingHint> {
        T::binding_hint()
    }
}
