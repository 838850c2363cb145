//! Error types for the Relay framework.
//!
//! Registration-time errors ([`PatternError`], [`RegistrationError`]) are fatal
//! to boot. Dispatch-time errors ([`DispatchError`], [`BindingError`],
//! [`RateLimitExceeded`]) are recoverable and left to the caller.

use std::time::Duration;

use thiserror::Error;

use relay_core::{BoxError, Verb};

// ============================================================================
// Registration
// ============================================================================

/// A route pattern that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// An optional parameter is followed by a required segment.
    #[error("optional parameter '{param}' must be trailing in pattern '{pattern}'")]
    NonTrailingOptional { pattern: String, param: String },

    /// The same parameter name appears twice.
    #[error("parameter '{param}' appears more than once in pattern '{pattern}'")]
    DuplicateParam { pattern: String, param: String },

    /// A constraint is not a valid regular expression.
    #[error("invalid constraint for '{param}' ({regex}): {reason}")]
    InvalidConstraintRegex {
        param: String,
        regex: String,
        reason: String,
    },

    /// A `{` without a matching `}`.
    #[error("unterminated placeholder in pattern '{pattern}'")]
    UnterminatedParam { pattern: String },

    /// A placeholder with an empty or malformed name.
    #[error("invalid placeholder name '{name}' in pattern '{pattern}'")]
    InvalidParamName { pattern: String, name: String },
}

/// `pop()` was called on the group context with no open group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("route group stack underflow: pop() without a matching push()")]
pub struct GroupStackUnderflow;

/// Errors raised while building the route collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    GroupStackUnderflow(#[from] GroupStackUnderflow),

    /// Two routes share a name.
    #[error("route name '{0}' is already registered")]
    DuplicateName(String),

    /// A second fallback route was registered.
    #[error("a fallback route is already registered")]
    FallbackAlreadyDefined,

    /// `finish()` was called with groups still open.
    #[error("{0} route group(s) were never closed")]
    UnclosedGroups(usize),

    /// A route definition without a handler.
    #[error("route '{pattern}' has no handler")]
    MissingHandler { pattern: String },

    /// A method-only handler outside a group that declares a controller.
    #[error("handler '{method}' names a method but no group controller is set")]
    MissingController { method: String },
}

/// Errors raised when generating a payload from a named route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("no route named '{0}'")]
    UnknownRoute(String),

    #[error("route '{route}' requires parameter '{param}'")]
    MissingParam { route: String, param: String },

    #[error("value '{value}' does not satisfy the constraint of '{param}' on route '{route}'")]
    ConstraintViolation {
        route: String,
        param: String,
        value: String,
    },
}

/// Errors raised by the cached-registry artifact.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The route uses an inline closure handler or inline middleware.
    #[error("route '{route}' cannot be cached: it uses an inline closure")]
    Uncacheable { route: String },

    #[error("cache artifact (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("cache artifact version {found} does not match expected version {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

// ============================================================================
// Dispatch
// ============================================================================

/// Errors that can occur during context extraction.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// A captured parameter the handler asked for does not exist.
    #[error("missing route parameter '{0}'")]
    MissingParam(String),

    /// A captured parameter failed to parse.
    #[error("route parameter '{param}' is invalid: {reason}")]
    InvalidParam { param: String, reason: String },

    /// The binder produced no value for this parameter.
    #[error("route parameter '{0}' was not bound")]
    NotBound(String),

    /// A dependency is not registered with the container.
    #[error("service '{0}' not found in container")]
    ServiceNotFound(&'static str),

    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors raised while resolving route parameters into values.
#[derive(Debug, Error)]
pub enum BindingError {
    /// No value could be resolved for the parameter.
    #[error("no value found for route parameter '{param}'")]
    NotFound { param: String },

    /// The repository collaborator failed.
    #[error("repository failed while binding '{param}': {source}")]
    Repository {
        param: String,
        #[source]
        source: BoxError,
    },
}

impl BindingError {
    pub fn not_found(param: impl Into<String>) -> Self {
        Self::NotFound {
            param: param.into(),
        }
    }

    /// Returns `true` for [`BindingError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A rate limit was exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("too many attempts on '{key}', retry after {}s", retry_after.as_secs())]
pub struct RateLimitExceeded {
    /// The bucket key that overflowed.
    pub key: String,
    /// The index of the limit that overflowed within its limiter.
    pub limit_index: usize,
    /// Time until the bucket resets.
    pub retry_after: Duration,
}

/// Errors raised by the throttle middleware.
#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("rate limiter '{0}' is not defined")]
    UnknownLimiter(String),

    #[error("invalid throttle arguments: {0:?}")]
    InvalidArguments(Vec<String>),

    #[error("rate limit store failed: {0}")]
    Store(#[source] BoxError),
}

/// The outcome of a rejected [`RateLimiter::attempt`](crate::throttle::RateLimiter::attempt).
#[derive(Debug, Error)]
pub enum RateLimited {
    #[error(transparent)]
    Exceeded(#[from] RateLimitExceeded),

    #[error(transparent)]
    Throttle(#[from] ThrottleError),
}

/// Errors that end a dispatch without a response.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No route matched and no fallback is registered.
    #[error("no route matches {verb} update '{payload}'")]
    Unhandled { verb: Verb, payload: String },

    /// The container could not resolve the route's handler.
    #[error("handler '{0}' could not be resolved")]
    HandlerNotFound(String),

    /// A middleware alias is not registered.
    #[error("middleware '{0}' is not registered")]
    UnknownMiddleware(String),

    /// Binding failed and the configured policy aborts.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// A handler argument could not be extracted.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// A handler or middleware returned an error.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),
}

impl DispatchError {
    /// Returns `true` if nothing matched the update.
    pub fn is_unhandled(&self) -> bool {
        matches!(self, Self::Unhandled { .. })
    }

    /// Classifies an error that came out of the middleware chain.
    pub fn from_chain(err: BoxError) -> Self {
        match err.downcast::<ExtractError>() {
            Ok(e) => Self::Extract(*e),
            Err(err) => match err.downcast::<BindingError>() {
                Ok(e) => Self::Binding(*e),
                Err(err) => Self::Handler(err),
            },
        }
    }
}
