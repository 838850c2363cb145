//! # Relay Framework
//!
//! The update dispatch core of a bot application.
//!
//! This layer provides:
//! - Pattern routes with constraints, names, and reverse generation
//! - Nested route groups that merge prefixes, names, middleware and constraints
//! - Axum-style handlers whose arguments are extracted from the request
//! - Model and enum binding of captured parameters
//! - A middleware pipeline with groups, priorities and terminate hooks
//! - Rate limiting through named limiters and the `throttle` middleware
//! - Clap-based command parsing (with the `command` feature)
//!
//! ```rust,ignore
//! use relay_framework::prelude::*;
//!
//! let mut r = RouteRegistrar::new();
//! r.command("/start", || async { "welcome" })?;
//! r.group(GroupAttributes::new().prefix("/admin/").middleware("throttle:10"), |r| {
//!     r.command("ban {id}", |Path(id): Path<u64>| async move { format!("banned {id}") })?;
//!     Ok(())
//! })?;
//!
//! let router = Router::builder(r.finish()?).build();
//! let done = router.dispatch(update).await?;
//! ```

extern crate self as relay_framework;

pub mod binding;
pub mod container;
pub mod context;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod middleware;
pub mod router;
pub mod routing;
pub mod throttle;

#[cfg(feature = "command")]
pub mod command;

pub use binding::{Bindable, Binder, NotFoundPolicy, Repository, RouteEnum};
pub use container::{Container, HandlerRegistry};
pub use context::Request;
pub use error::{
    BindingError, CacheError, DispatchError, ExtractError, ExtractResult, GenerateError,
    PatternError, RateLimitExceeded, RegistrationError,
};
pub use extractor::{Dep, EnumParam, FromContext, Model, Path};
pub use handler::{ErasedHandler, Handler, HandlerRef, IntoResponse, into_handler};
pub use middleware::{Middleware, MiddlewareRegistry, MiddlewareSpec, Next, from_fn};
pub use router::{DispatchConfig, Dispatched, Router, RouterBuilder};
pub use routing::{
    GroupAttributes, Route, RouteCollection, RouteDefinition, RouteParams, RouteRegistrar,
};
pub use throttle::{Limit, RateLimiter, ThrottleRequests};

#[cfg(feature = "command")]
pub use command::CommandArgs;

/// The types most applications need.
pub mod prelude {
    pub use crate::binding::{Bindable, Binder, NotFoundPolicy, RouteEnum};
    pub use crate::container::HandlerRegistry;
    pub use crate::context::Request;
    pub use crate::error::DispatchError;
    pub use crate::extractor::{Dep, EnumParam, Model, Path};
    pub use crate::middleware::{Middleware, MiddlewareRegistry, MiddlewareSpec, Next, from_fn};
    pub use crate::router::{Dispatched, Router};
    pub use crate::routing::{GroupAttributes, RouteDefinition, RouteParams, RouteRegistrar};
    pub use crate::throttle::{Limit, RateLimiter};

    #[cfg(feature = "command")]
    pub use crate::command::CommandArgs;
}
