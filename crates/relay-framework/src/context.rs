//! The per-dispatch request context.
//!
//! One [`Request`] is created for every update that matched a route, after
//! parameter binding and before the middleware chain runs. Middleware and the
//! handler share it through an `Arc`.
//!
//! Besides the update, the matched route, and the captured parameters, a
//! request carries a small typed state map. Middleware use it to hand values
//! to later middleware or the handler.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use relay_core::Update;

use crate::binding::BoundValue;
use crate::container::Container;
use crate::error::{ExtractError, ExtractResult};
use crate::routing::{Route, RouteParams};

/// The context handed to middleware and handlers.
pub struct Request {
    update: Arc<Update>,
    route: Arc<Route>,
    params: RouteParams,
    bound: HashMap<String, BoundValue>,
    container: Arc<dyn Container>,
    state: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Request {
    pub fn new(
        update: Arc<Update>,
        route: Arc<Route>,
        params: RouteParams,
        bound: HashMap<String, BoundValue>,
        container: Arc<dyn Container>,
    ) -> Self {
        Self {
            update,
            route,
            params,
            bound,
            container,
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn update(&self) -> &Arc<Update> {
        &self.update
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    /// The raw captured value of `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The bound value of `name`, if the binder resolved it.
    pub fn bound(&self, name: &str) -> Option<&BoundValue> {
        self.bound.get(name)
    }

    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    /// Looks up a service registered with the container.
    pub fn service<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.container
            .service(TypeId::of::<T>())
            .and_then(|arc| arc.downcast_ref::<Arc<T>>().map(Arc::clone))
    }

    pub fn require_service<T: ?Sized + Send + Sync + 'static>(&self) -> ExtractResult<Arc<T>> {
        self.service::<T>()
            .ok_or(ExtractError::ServiceNotFound(std::any::type_name::<T>()))
    }

    // ─── State ───────────────────────────────────────────────────────────────

    /// Stores a value for later middleware or the handler, replacing any
    /// previous value of the same type.
    pub fn set_state<T: Send + Sync + 'static>(&self, value: T) {
        self.state.lock().insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get_state<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn has_state<T: Send + Sync + 'static>(&self) -> bool {
        self.state.lock().contains_key(&TypeId::of::<T>())
    }

    pub fn take_state<T: Send + Sync + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("update", &self.update.id)
            .field("route", &self.route.identifier())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use relay_core::Update;

    use super::testing::request_for;

    #[test]
    fn test_state_roundtrip() {
        let req = request_for("ping", Update::text(1, "ping"));
        assert!(!req.has_state::<u32>());
        req.set_state(7u32);
        assert_eq!(req.get_state::<u32>(), Some(7));
        assert_eq!(req.take_state::<u32>(), Some(7));
        assert!(!req.has_state::<u32>());
    }

    #[test]
    fn test_param_access() {
        let req = request_for("user {id}", Update::text(1, "user 42"));
        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.route().pattern().source(), "user {id}");
    }
}
