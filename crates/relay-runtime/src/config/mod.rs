//! Configuration module for the Relay runtime.
//!
//! Configuration is layered with figment: built-in defaults, then config
//! files, then `RELAY_*` environment variables, then programmatic overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BindingConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, RateLimitConfig,
    RelayConfig, RoutingConfig, RuntimeConfig, SpanEventConfig, UnhandledPolicy,
};
pub use validation::validate_config;
