//! Relay Runtime - the layer that boots and runs a Relay application.
//!
//! This crate provides:
//! - Layered configuration (`RelayConfig`, `ConfigLoader`)
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - Route table boot from registration or a cache artifact (`RouteTable`)
//! - The dispatch loop (`RelayRuntime`) that delivers responses through a
//!   transport [`Responder`] and runs terminate hooks
//!
//! ```ignore
//! use relay_runtime::{RelayRuntime, RouteTable, config::load_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let table = RouteTable::new();
//!     let routes = table.boot(&config.routing, register_routes)?;
//!
//!     let router = Router::builder(routes)
//!         .container(handlers())
//!         .config(config.dispatch_config())
//!         .build();
//!     let runtime = RelayRuntime::from_config(&config, router, Arc::new(MyTransport));
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(128);
//!     spawn_transport(tx);
//!     runtime.run_until_signal(rx).await;
//!     Ok(())
//! }
//! ```

pub mod boot;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use boot::RouteTable;
pub use config::{ConfigError, ConfigLoader, ConfigResult, RelayConfig};
pub use error::{BootError, RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{Outcome, RelayRuntime, Responder, RuntimeStats};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for application code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
