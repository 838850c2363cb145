//! Handler and service resolution.
//!
//! Routes registered with a controller action or a handler name carry only the
//! reference; the [`Container`] turns it into a callable handler at dispatch
//! time. This keeps route collections serializable. The container also holds
//! the services that the [`Dep`](crate::extractor::Dep) extractor injects.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::{ErasedHandler, Handler, action_key, into_handler};

/// Heterogeneous service value. The inner `dyn Any` holds an `Arc<T>`.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// Resolves handler references and services.
pub trait Container: Send + Sync + 'static {
    /// Looks up a handler by its key (`"Controller@method"` or a name).
    fn resolve(&self, key: &str) -> Option<ErasedHandler>;

    /// Looks up a service by the `TypeId` of `T` in `Arc<T>`.
    fn service(&self, type_id: TypeId) -> Option<ServiceArc>;
}

/// The default in-memory [`Container`].
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, ErasedHandler>,
    services: HashMap<TypeId, ServiceArc>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` as `controller@method`.
    pub fn action<H, T>(mut self, controller: &str, method: &str, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handlers
            .insert(action_key(controller, method), into_handler(handler));
        self
    }

    /// Registers `handler` under `name`.
    pub fn named<H, T>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handlers.insert(name.into(), into_handler(handler));
        self
    }

    /// Registers a service value.
    pub fn provide<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.provide_arc(Arc::new(value))
    }

    /// Registers a shared service, which may be a trait object.
    pub fn provide_arc<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.services.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }
}

impl Container for HandlerRegistry {
    fn resolve(&self, key: &str) -> Option<ErasedHandler> {
        self.handlers.get(key).cloned()
    }

    fn service(&self, type_id: TypeId) -> Option<ServiceArc> {
        self.services.get(&type_id).cloned()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &keys)
            .field("services", &self.services.len())
            .finish()
    }
}
