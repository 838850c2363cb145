//! Route groups and the registrar that applies them.
//!
//! Groups form a stack. Each frame holds the attributes exactly as declared;
//! the effective attributes for a route are folded from the root frame
//! outward every time they are needed, so nothing depends on the order in
//! which earlier groups were opened and closed.
//!
//! Merge rules, parent then child:
//!
//! | attribute      | rule                                               |
//! |----------------|----------------------------------------------------|
//! | prefix         | joined with one separator, surrounding space trimmed |
//! | name prefix    | concatenated                                       |
//! | middleware     | appended                                           |
//! | excluded       | appended                                           |
//! | constraints    | child overrides parent per parameter               |
//! | controller     | child overrides parent                             |
//! | scope bindings | child overrides parent                             |

use std::sync::Arc;

use tracing::{debug, trace};

use relay_core::Verb;

use super::collection::RouteCollection;
use super::constraints::Constraints;
use super::pattern::CompiledPattern;
use super::route::{HandlerSpec, Route, RouteDefinition};
use crate::error::{GroupStackUnderflow, PatternError, RegistrationError};
use crate::handler::{Handler, HandlerRef};
use crate::middleware::MiddlewareSpec;

/// Attributes declared on one group.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct GroupAttributes {
    pub prefix: Option<String>,
    pub name_prefix: Option<String>,
    pub middleware: Vec<MiddlewareSpec>,
    pub excluded_middleware: Vec<String>,
    pub constraints: Constraints,
    pub controller: Option<String>,
    pub scope_bindings: Option<bool>,
}

impl GroupAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Prepended verbatim to the names of routes in the group.
    pub fn name(mut self, name_prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(name_prefix.into());
        self
    }

    pub fn middleware(mut self, spec: impl Into<MiddlewareSpec>) -> Self {
        self.middleware.push(spec.into());
        self
    }

    pub fn without_middleware(mut self, name: impl Into<String>) -> Self {
        self.excluded_middleware.push(name.into());
        self
    }

    pub fn where_(mut self, param: impl Into<String>, regex: impl Into<String>) -> Self {
        self.constraints.insert_unchecked(param.into(), regex.into());
        self
    }

    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        self.controller = Some(controller.into());
        self
    }

    pub fn scope_bindings(mut self, scoped: bool) -> Self {
        self.scope_bindings = Some(scoped);
        self
    }
}

/// The fold of every open group frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveAttributes {
    pub prefix: String,
    pub name_prefix: String,
    pub middleware: Vec<String>,
    pub excluded_middleware: Vec<String>,
    pub constraints: Constraints,
    pub controller: Option<String>,
    pub scope_bindings: Option<bool>,
}

/// Joins a prefix and a pattern with exactly one separator.
///
/// Surrounding whitespace on both sides is trimmed. If either side supplies a
/// `/` at the seam, a single `/` joins them; otherwise a single space does.
pub fn join_prefix(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim();
    let pattern = pattern.trim();
    if prefix.is_empty() {
        return pattern.to_string();
    }
    if pattern.is_empty() {
        return prefix.to_string();
    }
    let slash = prefix.ends_with('/') || pattern.starts_with('/');
    let head = prefix.trim_end_matches('/').trim_end();
    let tail = pattern.trim_start_matches('/').trim_start();
    if slash {
        format!("{head}/{tail}")
    } else {
        format!("{head} {tail}")
    }
}

/// Builds a [`RouteCollection`] from definitions and nested groups.
///
/// ```rust,ignore
/// let mut r = RouteRegistrar::new();
/// r.group(GroupAttributes::new().prefix("admin").middleware("auth"), |r| {
///     r.add(RouteDefinition::text("ban {user}").named("admin.ban"))?;
///     Ok(())
/// })?;
/// let routes = r.finish()?;
/// ```
#[derive(Debug, Default)]
pub struct RouteRegistrar {
    stack: Vec<GroupAttributes>,
    global_constraints: Constraints,
    routes: RouteCollection,
}

impl RouteRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a registrar-wide constraint, used for any route that does not
    /// constrain `param` itself.
    pub fn pattern(
        &mut self,
        param: impl Into<String>,
        regex: impl Into<String>,
    ) -> Result<&mut Self, PatternError> {
        self.global_constraints.insert(param, regex)?;
        Ok(self)
    }

    pub fn global_constraints(&self) -> &Constraints {
        &self.global_constraints
    }

    /// Opens a group.
    pub fn push(&mut self, attrs: GroupAttributes) {
        trace!(depth = self.stack.len() + 1, "route group opened");
        self.stack.push(attrs);
    }

    /// Closes the innermost group.
    pub fn pop(&mut self) -> Result<GroupAttributes, GroupStackUnderflow> {
        let attrs = self.stack.pop().ok_or(GroupStackUnderflow)?;
        trace!(depth = self.stack.len(), "route group closed");
        Ok(attrs)
    }

    /// The number of open groups.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Folds every open frame, root first.
    pub fn current_effective(&self) -> EffectiveAttributes {
        self.stack
            .iter()
            .fold(EffectiveAttributes::default(), |mut eff, frame| {
                if let Some(prefix) = &frame.prefix {
                    eff.prefix = join_prefix(&eff.prefix, prefix);
                }
                if let Some(name) = &frame.name_prefix {
                    eff.name_prefix.push_str(name);
                }
                eff.middleware
                    .extend(frame.middleware.iter().map(ToString::to_string));
                eff.excluded_middleware
                    .extend(frame.excluded_middleware.iter().cloned());
                eff.constraints = eff.constraints.merged_with(&frame.constraints);
                if frame.controller.is_some() {
                    eff.controller.clone_from(&frame.controller);
                }
                if frame.scope_bindings.is_some() {
                    eff.scope_bindings = frame.scope_bindings;
                }
                eff
            })
    }

    /// Middleware of every open frame, root first, as declared.
    fn current_middleware(&self) -> Vec<MiddlewareSpec> {
        self.stack
            .iter()
            .flat_map(|frame| frame.middleware.iter().cloned())
            .collect()
    }

    /// Runs `f` inside a group. The group is closed even if `f` fails.
    pub fn group<F>(&mut self, attrs: GroupAttributes, f: F) -> Result<(), RegistrationError>
    where
        F: FnOnce(&mut Self) -> Result<(), RegistrationError>,
    {
        self.push(attrs);
        let result = f(self);
        self.pop().map(drop)?;
        result
    }

    /// Registers a route under the currently open groups.
    pub fn add(&mut self, def: RouteDefinition) -> Result<Arc<Route>, RegistrationError> {
        let eff = self.current_effective();

        let pattern = if def.fallback {
            def.pattern.trim().to_string()
        } else {
            join_prefix(&eff.prefix, &def.pattern)
        };
        let constraints = eff.constraints.merged_with(&def.constraints);
        let compiled = CompiledPattern::compile(&pattern, &constraints, &self.global_constraints)?;

        let handler = match def.handler {
            Some(HandlerSpec::Ref(handler)) => handler,
            Some(HandlerSpec::Method(method)) => match &eff.controller {
                Some(controller) => HandlerRef::action(controller.clone(), method),
                None => return Err(RegistrationError::MissingController { method }),
            },
            None => return Err(RegistrationError::MissingHandler { pattern }),
        };

        let name = def.name.map(|n| format!("{}{n}", eff.name_prefix));

        let mut middleware = self.current_middleware();
        middleware.extend(def.middleware);
        let mut excluded = eff.excluded_middleware;
        excluded.extend(def.excluded_middleware);

        let mut binding = def.binding;
        if binding.scope_bindings.is_none() {
            binding.scope_bindings = eff.scope_bindings;
        }

        let route = Route::new(
            def.verbs,
            compiled,
            handler,
            middleware,
            excluded,
            name,
            eff.prefix,
            constraints,
            binding,
            def.fallback,
        );
        debug!(
            pattern = route.pattern().source(),
            name = route.name(),
            "route registered"
        );
        self.routes.register(route)
    }

    /// Registers an inline text route.
    pub fn text<H, T>(
        &mut self,
        pattern: impl Into<String>,
        handler: H,
    ) -> Result<Arc<Route>, RegistrationError>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.add(RouteDefinition::text(pattern).handler(handler))
    }

    /// Registers an inline command route.
    pub fn command<H, T>(
        &mut self,
        pattern: impl Into<String>,
        handler: H,
    ) -> Result<Arc<Route>, RegistrationError>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.add(RouteDefinition::command(pattern).handler(handler))
    }

    /// Registers an inline callback query route.
    pub fn callback_query<H, T>(
        &mut self,
        pattern: impl Into<String>,
        handler: H,
    ) -> Result<Arc<Route>, RegistrationError>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.add(RouteDefinition::callback_query(pattern).handler(handler))
    }

    /// Registers an inline route for an arbitrary verb set.
    pub fn verbs<I, H, T>(
        &mut self,
        verbs: I,
        pattern: impl Into<String>,
        handler: H,
    ) -> Result<Arc<Route>, RegistrationError>
    where
        I: IntoIterator<Item = Verb>,
        H: Handler<T>,
        T: 'static,
    {
        self.add(RouteDefinition::verbs(verbs, pattern).handler(handler))
    }

    /// Registers the fallback route.
    pub fn fallback<H, T>(&mut self, handler: H) -> Result<Arc<Route>, RegistrationError>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.add(RouteDefinition::fallback().handler(handler))
    }

    /// The routes registered so far.
    pub fn routes(&self) -> &RouteCollection {
        &self.routes
    }

    /// Finishes registration.
    ///
    /// Fails if any group is still open.
    pub fn finish(self) -> Result<RouteCollection, RegistrationError> {
        if !self.stack.is_empty() {
            return Err(RegistrationError::UnclosedGroups(self.stack.len()));
        }
        Ok(self.routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::constraints::NUMERIC;

    async fn handler() -> &'static str {
        "ok"
    }

    #[test]
    fn test_join_prefix() {
        assert_eq!(join_prefix("admin", "users"), "admin users");
        assert_eq!(join_prefix("admin/", "users"), "admin/users");
        assert_eq!(join_prefix("admin", "/users"), "admin/users");
        assert_eq!(join_prefix(" admin/ ", " /users "), "admin/users");
        assert_eq!(join_prefix("", "users"), "users");
        assert_eq!(join_prefix("admin", ""), "admin");
    }

    #[test]
    fn test_nested_groups_merge() {
        let mut r = RouteRegistrar::new();
        r.push(
            GroupAttributes::new()
                .prefix("admin")
                .name("admin.")
                .middleware("auth")
                .where_("id", NUMERIC),
        );
        r.push(
            GroupAttributes::new()
                .prefix("users")
                .name("users.")
                .middleware("log")
                .controller("UserController"),
        );
        let eff = r.current_effective();
        assert_eq!(eff.prefix, "admin users");
        assert_eq!(eff.name_prefix, "admin.users.");
        assert_eq!(eff.middleware, vec!["auth", "log"]);
        assert_eq!(eff.constraints.get("id"), Some(NUMERIC));
        assert_eq!(eff.controller.as_deref(), Some("UserController"));

        let route = r
            .add(RouteDefinition::text("show {id}").name("show").uses("show"))
            .unwrap();
        assert_eq!(route.name(), Some("admin.users.show"));
        assert_eq!(route.pattern().source(), "admin users show {id}");
        assert_eq!(
            route.handler(),
            &HandlerRef::action("UserController", "show")
        );
        assert!(route.pattern().is_match("admin users show 5"));
        assert!(!route.pattern().is_match("admin users show x"));
    }

    #[test]
    fn test_effective_attributes_are_order_independent() {
        let a = || GroupAttributes::new().prefix("a").name("a.").middleware("m1");
        let b = || GroupAttributes::new().prefix("b").name("b.").middleware("m2");
        let c = || GroupAttributes::new().prefix("c").middleware("m3");

        let mut direct = RouteRegistrar::new();
        direct.push(a());
        direct.push(b());

        let mut roundabout = RouteRegistrar::new();
        roundabout.push(a());
        roundabout.push(c());
        roundabout.push(b());
        roundabout.pop().unwrap();
        roundabout.pop().unwrap();
        roundabout.push(b());

        assert_eq!(direct.current_effective(), roundabout.current_effective());
        assert_eq!(direct.current_effective().prefix, "a b");
    }

    #[test]
    fn test_pop_without_push_underflows() {
        let mut r = RouteRegistrar::new();
        assert_eq!(r.pop().unwrap_err(), GroupStackUnderflow);
    }

    #[test]
    fn test_group_closes_on_error() {
        let mut r = RouteRegistrar::new();
        let result = r.group(GroupAttributes::new().prefix("x"), |r| {
            r.add(RouteDefinition::text("a"))?;
            Ok(())
        });
        assert!(matches!(result, Err(RegistrationError::MissingHandler { .. })));
        assert_eq!(r.depth(), 0);
    }

    #[test]
    fn test_group_pops_its_frame_on_success() {
        let mut r = RouteRegistrar::new();
        r.group(GroupAttributes::new().prefix("outer"), |r| {
            r.group(GroupAttributes::new().prefix("inner"), |r| {
                assert_eq!(r.depth(), 2);
                r.add(RouteDefinition::text("x").handler(handler))?;
                Ok(())
            })?;
            assert_eq!(r.depth(), 1);
            assert_eq!(r.current_effective().prefix, "outer");
            Ok(())
        })
        .unwrap();
        assert_eq!(r.depth(), 0);
        let routes = r.finish().unwrap();
        assert_eq!(routes.iter().next().unwrap().pattern().source(), "outer inner x");
    }

    #[test]
    fn test_finish_rejects_open_groups() {
        let mut r = RouteRegistrar::new();
        r.push(GroupAttributes::new());
        assert!(matches!(r.finish(), Err(RegistrationError::UnclosedGroups(1))));
    }

    #[test]
    fn test_method_without_controller() {
        let mut r = RouteRegistrar::new();
        let err = r.add(RouteDefinition::text("a").uses("show")).unwrap_err();
        assert!(matches!(err, RegistrationError::MissingController { ref method } if method == "show"));
    }

    #[test]
    fn test_route_constraint_overrides_group_and_global() {
        let mut r = RouteRegistrar::new();
        r.pattern("id", "[a-z]+").unwrap();
        r.push(GroupAttributes::new().where_("id", NUMERIC));
        let grouped = r.add(RouteDefinition::text("g {id}").handler(handler)).unwrap();
        let own = r
            .add(RouteDefinition::text("o {id}").where_("id", "x+").handler(handler))
            .unwrap();
        r.pop().unwrap();
        let global = r.add(RouteDefinition::text("n {id}").handler(handler)).unwrap();

        assert!(grouped.pattern().is_match("g 12"));
        assert!(!grouped.pattern().is_match("g ab"));
        assert!(own.pattern().is_match("o xxx"));
        assert!(!own.pattern().is_match("o 12"));
        assert!(global.pattern().is_match("n ab"));
        assert!(!global.pattern().is_match("n 12"));
    }

    #[test]
    fn test_group_middleware_precedes_route_middleware() {
        let mut r = RouteRegistrar::new();
        r.group(GroupAttributes::new().middleware("throttle:3,1"), |r| {
            r.add(
                RouteDefinition::text("a")
                    .middleware("auth")
                    .without_middleware("log")
                    .handler(handler),
            )?;
            Ok(())
        })
        .unwrap();
        let routes = r.finish().unwrap();
        let route = routes.iter().next().unwrap();
        let names: Vec<String> = route.middleware().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["throttle:3,1", "auth"]);
        assert_eq!(route.excluded_middleware(), ["log".to_string()]);
    }

    #[test]
    fn test_fallback_ignores_prefix() {
        let mut r = RouteRegistrar::new();
        r.push(GroupAttributes::new().prefix("admin"));
        let route = r.fallback(handler).unwrap();
        assert!(route.pattern().is_wildcard());
        assert!(route.is_fallback());
    }
}
