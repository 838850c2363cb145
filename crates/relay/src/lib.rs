//! # Relay
//!
//! A dispatch core for chat bots. Inbound updates (messages, commands,
//! button callbacks, inline queries) are matched against pattern routes,
//! their parameters are bound to models, and they run through a middleware
//! pipeline to a handler.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────────────────────────────────────────────┐   ┌───────────┐
//! │ transport │──▶│ Router: match ─▶ bind ─▶ middleware ─▶ handler     │──▶│ Responder │
//! │ (updates) │   │         │                 │ throttle, groups       │   │ (deliver) │
//! └───────────┘   └─────────┼─────────────────┼────────────────────────┘   └─────┬─────┘
//!                           ▼                 ▼                                  ▼
//!                      RouteTable        RateLimiter                     terminate hooks
//! ```
//!
//! - **relay-core**: `Update`, `Verb`, `Response`
//! - **relay-framework**: routing, groups, binding, middleware, throttling
//! - **relay-runtime**: configuration, logging, route boot, dispatch loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relay::prelude::*;
//!
//! let mut r = RouteRegistrar::new();
//! r.command("/start", || async { "hello" })?;
//! r.group(GroupAttributes::new().prefix("/admin/").middleware("throttle:10"), |r| {
//!     r.command("ban {id}", |Path(id): Path<u64>| async move { format!("banned {id}") })?;
//!     Ok(())
//! })?;
//!
//! let router = Router::builder(r.finish()?).build();
//! let runtime = RelayRuntime::new(router, Arc::new(MyTransport));
//! runtime.run_until_signal(rx).await;
//! ```
//!
//! ## Features
//!
//! - `macros`: `Bindable` and `RouteEnum` derives (default)
//! - `command`: clap-based `CommandArgs` extractor (default)
//! - `toml-config` / `yaml-config`: config file formats
//! - `json-log`: JSON log output

pub use relay_core as core;
pub use relay_framework as framework;
pub use relay_runtime as runtime;

#[cfg(feature = "macros")]
pub use relay_macros::{Bindable, RouteEnum};

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry point
    pub use relay_runtime::{RelayRuntime, Responder, RouteTable};

    // Update envelope and responses
    pub use relay_core::{BoxError, Reply, Response, ResponseStatus, Update, Verb};

    // Route registration and dispatch
    pub use relay_framework::prelude::*;
    pub use relay_framework::routing::RouteCollection;

    // Derives share their names with the traits
    #[cfg(feature = "macros")]
    pub use relay_macros::{Bindable, RouteEnum};
}
