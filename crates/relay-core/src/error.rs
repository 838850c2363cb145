//! Error types shared across the Relay crates.

use thiserror::Error;

/// A type-erased error raised by handlers and middleware.
///
/// Identical to `tower::BoxError`; the router never inspects it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A verb name that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown verb '{0}'")]
pub struct UnknownVerb(pub String);
