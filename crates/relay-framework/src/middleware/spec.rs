//! Middleware references as they appear on routes and groups.
//!
//! A reference is either an alias resolved through the
//! [`MiddlewareRegistry`](super::MiddlewareRegistry) or an inline middleware
//! value. Aliases may carry comma-separated arguments after a colon:
//!
//! ```text
//! "auth"            → Alias("auth"), []
//! "throttle:3,1"    → Alias("throttle"), ["3", "1"]
//! "role:admin"      → Alias("role"), ["admin"]
//! ```
//!
//! The string form is parsed once, when the [`MiddlewareSpec`] is built.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Middleware;

/// An inline middleware value together with the label used to identify it in
/// priority lists, exclusions, and logs.
#[derive(Clone)]
pub struct InlineMiddleware {
    label: String,
    inner: Arc<dyn Middleware>,
}

impl InlineMiddleware {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn middleware(&self) -> &Arc<dyn Middleware> {
        &self.inner
    }
}

impl fmt::Debug for InlineMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineMiddleware")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// What a [`MiddlewareSpec`] points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareRef {
    /// A name registered with the middleware registry (alias or group).
    Alias(String),
    /// A middleware value attached directly. Never cacheable.
    #[serde(skip)]
    Inline(InlineMiddleware),
}

/// A middleware reference plus its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareSpec {
    pub reference: MiddlewareRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl MiddlewareSpec {
    /// Parses `"name"` or `"name:a,b,c"`.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let (name, args) = match spec.split_once(':') {
            Some((name, args)) => (
                name.trim(),
                args.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            None => (spec, Vec::new()),
        };
        Self {
            reference: MiddlewareRef::Alias(name.to_string()),
            args,
        }
    }

    /// Wraps a middleware value under `label`.
    pub fn inline(label: impl Into<String>, middleware: impl Middleware) -> Self {
        Self {
            reference: MiddlewareRef::Inline(InlineMiddleware {
                label: label.into(),
                inner: Arc::new(middleware),
            }),
            args: Vec::new(),
        }
    }

    /// Appends arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The alias or inline label.
    pub fn name(&self) -> &str {
        match &self.reference {
            MiddlewareRef::Alias(name) => name,
            MiddlewareRef::Inline(inline) => inline.label(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.reference, MiddlewareRef::Inline(_))
    }

    /// Returns `true` if both specs name the same middleware with the same
    /// arguments.
    pub fn same_as(&self, other: &MiddlewareSpec) -> bool {
        self.is_inline() == other.is_inline()
            && self.name() == other.name()
            && self.args == other.args
    }
}

impl From<&str> for MiddlewareSpec {
    fn from(spec: &str) -> Self {
        Self::parse(spec)
    }
}

impl From<String> for MiddlewareSpec {
    fn from(spec: String) -> Self {
        Self::parse(&spec)
    }
}

impl From<&String> for MiddlewareSpec {
    fn from(spec: &String) -> Self {
        Self::parse(spec)
    }
}

impl fmt::Display for MiddlewareSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if !self.args.is_empty() {
            write!(f, ":{}", self.args.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_args() {
        let spec = MiddlewareSpec::parse("throttle:3, 1");
        assert_eq!(spec.name(), "throttle");
        assert_eq!(spec.args, vec!["3", "1"]);
        assert_eq!(spec.to_string(), "throttle:3,1");
    }

    #[test]
    fn test_parse_bare_alias() {
        let spec = MiddlewareSpec::from("auth");
        assert_eq!(spec.name(), "auth");
        assert!(spec.args.is_empty());
        assert!(!spec.is_inline());
    }

    #[test]
    fn test_same_as_compares_args() {
        let a = MiddlewareSpec::parse("role:admin");
        let b = MiddlewareSpec::parse("role:admin");
        let c = MiddlewareSpec::parse("role:mod");
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }
}
