//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;

use relay_core::BoxError;
use relay_framework::{CacheError, DispatchError, RegistrationError};

use crate::config::ConfigError;

/// Errors raised while populating the route table.
#[derive(Error, Debug)]
pub enum BootError {
    /// The table was already populated by a rebuild or a cache load.
    #[error("route table is already populated")]
    AlreadyPopulated,

    #[error("route table has not been populated")]
    NotPopulated,

    #[error("route registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("route cache failed: {0}")]
    Cache(#[from] CacheError),

    #[error("failed to access route cache at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the dispatch loop.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The responder failed to deliver a response.
    #[error("delivery failed: {0}")]
    Deliver(#[source] BoxError),

    #[error(transparent)]
    Boot(#[from] BootError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
