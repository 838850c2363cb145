//! Handler system for the Relay framework.
//!
//! Handlers are plain async functions whose arguments implement
//! [`FromContext`](crate::extractor::FromContext) and whose return value
//! implements [`IntoResponse`]:
//!
//! ```rust,ignore
//! async fn show(Path((id,)): Path<(u64,)>) -> String {
//!     format!("user {id}")
//! }
//!
//! async fn edit(post: Model<Post>, update: Arc<Update>) -> anyhow::Result<Response> {
//!     // ...
//! }
//! ```
//!
//! Routes refer to handlers through a [`HandlerRef`]: a controller action or
//! a registered name, both resolved through the
//! [`Container`](crate::container::Container), or an inline closure.

mod response;
mod traits;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use response::IntoResponse;
pub use traits::{ErasedHandler, Handler, HandlerFuture, into_handler};

/// How a route refers to its handler.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerRef {
    /// A method on a controller, resolved by `"Controller@method"`.
    Action { controller: String, method: String },
    /// A handler registered under an explicit name.
    Named { name: String },
    /// A closure attached at registration time. Never cacheable.
    #[serde(skip)]
    Inline(ErasedHandler),
}

impl HandlerRef {
    pub fn action(controller: impl Into<String>, method: impl Into<String>) -> Self {
        Self::Action {
            controller: controller.into(),
            method: method.into(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named { name: name.into() }
    }

    /// The key used to look the handler up in a container.
    ///
    /// Returns `None` for inline handlers.
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Action { controller, method } => Some(action_key(controller, method)),
            Self::Named { name } => Some(name.clone()),
            Self::Inline(_) => None,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action { controller, method } => write!(f, "Action({controller}@{method})"),
            Self::Named { name } => write!(f, "Named({name})"),
            Self::Inline(_) => f.write_str("Inline(<closure>)"),
        }
    }
}

impl PartialEq for HandlerRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Inline(a), Self::Inline(b)) => a.ptr_eq(b),
            (Self::Inline(_), _) | (_, Self::Inline(_)) => false,
            _ => self.key() == other.key(),
        }
    }
}

/// Formats a controller action as its lookup key.
pub fn action_key(controller: &str, method: &str) -> String {
    format!("{controller}@{method}")
}
