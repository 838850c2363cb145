//! Route parameter binding.
//!
//! Before a handler runs, captured parameters that the handler declares as
//! models or enums are resolved into values:
//!
//! 1. an explicit resolver registered for the parameter name wins;
//! 2. otherwise an enum-typed argument validates the raw value against the
//!    enum's cases;
//! 3. otherwise a model-typed argument is looked up through the
//!    [`Repository`] by its route key (or the `{param:field}` override).
//!
//! Scoped binding resolves a child parameter through the relation on the
//! previously bound parameter instead of a global lookup. It is on when the
//! route says so, or implied when a later parameter uses a custom lookup field.
//!
//! Parameters that resolve to nothing follow the [`NotFoundPolicy`].

mod binder;
mod traits;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use binder::Binder;
pub use traits::{Bindable, Lookup, Repository, RouteEnum};

/// What an extractor asks the binder to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingHint {
    /// The route parameter name.
    pub param: &'static str,
    pub kind: BindingKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// Look the value up through the repository.
    Entity {
        entity: &'static str,
        route_key: &'static str,
        relation: &'static str,
    },
    /// Validate the value against a closed set of cases.
    Enum { values: &'static [&'static str] },
}

/// A resolved model instance.
#[derive(Clone)]
pub struct BoundEntity {
    entity: String,
    value: Arc<dyn Any + Send + Sync>,
}

impl BoundEntity {
    pub fn new<T: Any + Send + Sync>(entity: impl Into<String>, value: T) -> Self {
        Self {
            entity: entity.into(),
            value: Arc::new(value),
        }
    }

    /// Wraps a [`Bindable`] value under its entity name.
    pub fn of<T: Bindable>(value: T) -> Self {
        Self::new(T::ENTITY, value)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for BoundEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundEntity")
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}

/// The outcome of binding one parameter.
#[derive(Debug, Clone)]
pub enum BoundValue {
    /// A model instance.
    Entity(BoundEntity),
    /// A raw value that passed enum validation.
    Enum(String),
    /// Nothing was found and the policy passes `null` through.
    Missing,
}

/// What to do when a parameter resolves to nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundPolicy {
    /// Fail the dispatch with [`BindingError::NotFound`](crate::error::BindingError::NotFound).
    Abort,
    /// Continue with the parameter unbound.
    #[default]
    Null,
}
