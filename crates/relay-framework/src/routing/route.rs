//! Route records and the builder used to declare them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use relay_core::Verb;

use super::constraints::Constraints;
use super::pattern::CompiledPattern;
use crate::handler::{ErasedHandler, Handler, HandlerRef, into_handler};
use crate::middleware::MiddlewareSpec;

/// Per-route binding switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingOptions {
    /// Include soft-deleted models in implicit binding.
    #[serde(default)]
    pub with_trashed: bool,
    /// Explicit scoped-binding switch. `None` means "implied by the pattern".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_bindings: Option<bool>,
}

/// A registered route.
///
/// Immutable once registered; the collection hands out `Arc<Route>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    verbs: BTreeSet<Verb>,
    pattern: CompiledPattern,
    handler: HandlerRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    middleware: Vec<MiddlewareSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    excluded_middleware: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    /// The effective group prefix the pattern was registered under.
    #[serde(default)]
    prefix: String,
    /// The merged group and route constraints.
    #[serde(default)]
    constraints: Constraints,
    #[serde(default)]
    binding: BindingOptions,
    #[serde(default)]
    fallback: bool,
}

impl Route {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        verbs: BTreeSet<Verb>,
        pattern: CompiledPattern,
        handler: HandlerRef,
        middleware: Vec<MiddlewareSpec>,
        excluded_middleware: Vec<String>,
        name: Option<String>,
        prefix: String,
        constraints: Constraints,
        binding: BindingOptions,
        fallback: bool,
    ) -> Self {
        Self {
            verbs,
            pattern,
            handler,
            middleware,
            excluded_middleware,
            name,
            prefix,
            constraints,
            binding,
            fallback,
        }
    }

    pub fn verbs(&self) -> &BTreeSet<Verb> {
        &self.verbs
    }

    /// Returns `true` if this route answers updates of `verb`.
    pub fn answers(&self, verb: Verb) -> bool {
        self.verbs.contains(&verb) || self.verbs.contains(&Verb::Match)
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Route and group middleware, outermost group first.
    pub fn middleware(&self) -> &[MiddlewareSpec] {
        &self.middleware
    }

    pub fn excluded_middleware(&self) -> &[String] {
        &self.excluded_middleware
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn binding(&self) -> &BindingOptions {
        &self.binding
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// A human-readable identifier: the name if any, else the pattern.
    pub fn identifier(&self) -> &str {
        self.name.as_deref().unwrap_or(self.pattern.source())
    }

    /// Returns `true` if neither the handler nor any middleware is inline.
    pub fn is_cacheable(&self) -> bool {
        !self.handler.is_inline() && !self.middleware.iter().any(MiddlewareSpec::is_inline)
    }
}

/// Captured parameters in capture order. Absent optionals are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(Vec<(String, Option<String>)>);

impl RouteParams {
    pub fn new(params: Vec<(String, Option<String>)>) -> Self {
        Self(params)
    }

    /// The value of `name`, if captured.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Returns `true` if the pattern declares `name`, captured or not.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    /// Captured values in order, stopping at the first absent optional.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map_while(|(_, v)| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How a definition refers to its handler before group attributes apply.
#[derive(Debug, Clone)]
pub(crate) enum HandlerSpec {
    Ref(HandlerRef),
    /// A bare method name, resolved against the group controller.
    Method(String),
}

/// A route declaration, turned into a [`Route`] by the
/// [`RouteRegistrar`](super::RouteRegistrar).
///
/// ```rust,ignore
/// registrar.add(
///     RouteDefinition::text("user {id}")
///         .where_number("id")
///         .name("users.show")
///         .middleware("auth")
///         .action("UserController", "show"),
/// )?;
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct RouteDefinition {
    pub(crate) verbs: BTreeSet<Verb>,
    pub(crate) pattern: String,
    pub(crate) handler: Option<HandlerSpec>,
    pub(crate) middleware: Vec<MiddlewareSpec>,
    pub(crate) excluded_middleware: Vec<String>,
    pub(crate) name: Option<String>,
    pub(crate) constraints: Constraints,
    pub(crate) binding: BindingOptions,
    pub(crate) fallback: bool,
}

impl RouteDefinition {
    /// A route answering the given verbs.
    pub fn verbs<I: IntoIterator<Item = Verb>>(verbs: I, pattern: impl Into<String>) -> Self {
        Self {
            verbs: verbs.into_iter().collect(),
            pattern: pattern.into(),
            handler: None,
            middleware: Vec::new(),
            excluded_middleware: Vec::new(),
            name: None,
            constraints: Constraints::new(),
            binding: BindingOptions::default(),
            fallback: false,
        }
    }

    pub fn text(pattern: impl Into<String>) -> Self {
        Self::verbs([Verb::Text], pattern)
    }

    pub fn command(pattern: impl Into<String>) -> Self {
        Self::verbs([Verb::Command], pattern)
    }

    pub fn callback_query(pattern: impl Into<String>) -> Self {
        Self::verbs([Verb::CallbackQuery], pattern)
    }

    pub fn inline_query(pattern: impl Into<String>) -> Self {
        Self::verbs([Verb::InlineQuery], pattern)
    }

    /// A route answering every verb.
    pub fn any(pattern: impl Into<String>) -> Self {
        Self::verbs([Verb::Match], pattern)
    }

    /// The catch-all route considered after every other route.
    pub fn fallback() -> Self {
        let mut def = Self::any("");
        def.fallback = true;
        def
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn middleware(mut self, spec: impl Into<MiddlewareSpec>) -> Self {
        self.middleware.push(spec.into());
        self
    }

    /// Strips `name` from this route's merged middleware chain.
    pub fn without_middleware(mut self, name: impl Into<String>) -> Self {
        self.excluded_middleware.push(name.into());
        self
    }

    /// Constrains `param` to `regex`. Validated when the route is registered.
    pub fn where_(mut self, param: impl Into<String>, regex: impl Into<String>) -> Self {
        self.constraints.insert_unchecked(param.into(), regex.into());
        self
    }

    pub fn where_number(self, param: impl Into<String>) -> Self {
        self.where_(param, super::constraints::NUMERIC)
    }

    pub fn where_alpha(self, param: impl Into<String>) -> Self {
        self.where_(param, super::constraints::ALPHA)
    }

    pub fn where_alpha_numeric(self, param: impl Into<String>) -> Self {
        self.where_(param, super::constraints::ALPHA_NUMERIC)
    }

    pub fn where_uuid(self, param: impl Into<String>) -> Self {
        self.where_(param, super::constraints::UUID)
    }

    pub fn where_in<I, S>(self, param: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.where_(param, super::constraints::one_of(values))
    }

    /// Includes soft-deleted models when binding.
    pub fn with_trashed(mut self) -> Self {
        self.binding.with_trashed = true;
        self
    }

    /// Forces scoped binding on or off.
    pub fn scope_bindings(mut self, scoped: bool) -> Self {
        self.binding.scope_bindings = Some(scoped);
        self
    }

    /// Shorthand for `scope_bindings(false)`.
    pub fn without_scoped_bindings(self) -> Self {
        self.scope_bindings(false)
    }

    /// Attaches an inline closure handler.
    pub fn handler<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handler = Some(HandlerSpec::Ref(HandlerRef::Inline(into_handler(handler))));
        self
    }

    /// Attaches an already erased handler.
    pub fn erased(mut self, handler: ErasedHandler) -> Self {
        self.handler = Some(HandlerSpec::Ref(HandlerRef::Inline(handler)));
        self
    }

    /// Refers to `controller@method`.
    pub fn action(mut self, controller: impl Into<String>, method: impl Into<String>) -> Self {
        self.handler = Some(HandlerSpec::Ref(HandlerRef::action(controller, method)));
        self
    }

    /// Refers to a handler registered under `name`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.handler = Some(HandlerSpec::Ref(HandlerRef::named(name)));
        self
    }

    /// Refers to a handler by string.
    ///
    /// `"Controller@method"` names an action directly; a bare method name is
    /// resolved against the enclosing group's controller.
    pub fn uses(mut self, target: &str) -> Self {
        self.handler = Some(match target.split_once('@') {
            Some((controller, method)) => {
                HandlerSpec::Ref(HandlerRef::action(controller.trim(), method.trim()))
            }
            None => HandlerSpec::Method(target.trim().to_string()),
        });
        self
    }
}
