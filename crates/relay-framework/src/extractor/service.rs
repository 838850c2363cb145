use std::ops::Deref;
use std::sync::Arc;

use super::FromContext;
use crate::context::Request;
use crate::error::ExtractResult;

/// A service injected from the container.
///
/// `T` may be a trait object registered with
/// [`HandlerRegistry::provide_arc`](crate::container::HandlerRegistry::provide_arc):
///
/// ```rust,ignore
/// async fn greet(greeter: Dep<dyn Greeter>) -> String {
///     greeter.greet()
/// }
/// ```
pub struct Dep<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Clone for Dep<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> Deref for Dep<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + Send + Sync + 'static> FromContext for Dep<T> {
    fn from_context(req: &Request) -> ExtractResult<Self> {
        req.require_service::<T>().map(Dep)
    }
}
