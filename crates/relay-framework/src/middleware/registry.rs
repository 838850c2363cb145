use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::pipeline::{Chain, ResolvedMiddleware};
use super::priority::sort_by_priority;
use super::spec::{MiddlewareRef, MiddlewareSpec};
use super::Middleware;
use crate::error::DispatchError;
use crate::routing::Route;

/// Aliases, named groups, the global list, and the priority order.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    aliases: HashMap<String, Arc<dyn Middleware>>,
    groups: HashMap<String, Vec<MiddlewareSpec>>,
    global: Vec<MiddlewareSpec>,
    priority: Vec<String>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `middleware` under `name`.
    pub fn alias(mut self, name: impl Into<String>, middleware: impl Middleware) -> Self {
        self.aliases.insert(name.into(), Arc::new(middleware));
        self
    }

    pub fn alias_arc(mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) -> Self {
        self.aliases.insert(name.into(), middleware);
        self
    }

    /// Registers a named group that expands to `members`.
    pub fn group<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<MiddlewareSpec>,
    {
        self.groups
            .insert(name.into(), members.into_iter().map(Into::into).collect());
        self
    }

    /// Appends to the list that runs for every route.
    pub fn global(mut self, spec: impl Into<MiddlewareSpec>) -> Self {
        self.global.push(spec.into());
        self
    }

    /// Sets the priority order.
    pub fn priority<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Builds the chain for `route`.
    ///
    /// `excluded_global` removes entries from the global list for this request
    /// only; the route's own exclusions apply to the whole merged chain.
    pub fn build(&self, route: &Route, excluded_global: &[String]) -> Result<Chain, DispatchError> {
        let specs = self.gather(route, excluded_global);
        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            let middleware = match &spec.reference {
                MiddlewareRef::Inline(inline) => Arc::clone(inline.middleware()),
                MiddlewareRef::Alias(name) => self
                    .aliases
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DispatchError::UnknownMiddleware(name.clone()))?,
            };
            entries.push(ResolvedMiddleware {
                name: spec.name().to_string(),
                middleware,
                args: spec.args,
            });
        }
        Ok(Chain::new(entries))
    }

    /// The ordered, deduplicated specs for `route`, before alias resolution.
    pub fn gather(&self, route: &Route, excluded_global: &[String]) -> Vec<MiddlewareSpec> {
        let mut merged = Vec::new();
        for spec in &self.global {
            self.expand(spec, &mut merged, &mut HashSet::new());
        }
        merged.retain(|spec| !excluded_global.iter().any(|e| e == spec.name()));
        for spec in route.middleware() {
            self.expand(spec, &mut merged, &mut HashSet::new());
        }

        let excluded = route.excluded_middleware();
        merged.retain(|spec| !excluded.iter().any(|e| e == spec.name()));

        let sorted = sort_by_priority(merged, &self.priority, MiddlewareSpec::name);

        let mut unique: Vec<MiddlewareSpec> = Vec::with_capacity(sorted.len());
        for spec in sorted {
            if !unique.iter().any(|u| u.same_as(&spec)) {
                unique.push(spec);
            }
        }
        unique
    }

    fn expand(
        &self,
        spec: &MiddlewareSpec,
        out: &mut Vec<MiddlewareSpec>,
        seen: &mut HashSet<String>,
    ) {
        let members = match &spec.reference {
            MiddlewareRef::Alias(name) if spec.args.is_empty() => self.groups.get(name),
            _ => None,
        };
        let Some(members) = members else {
            out.push(spec.clone());
            return;
        };
        if !seen.insert(spec.name().to_string()) {
            warn!(group = spec.name(), "middleware group includes itself, skipping");
            return;
        }
        for member in members {
            self.expand(member, out, seen);
        }
        seen.remove(spec.name());
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aliases: Vec<&String> = self.aliases.keys().collect();
        aliases.sort();
        f.debug_struct("MiddlewareRegistry")
            .field("aliases", &aliases)
            .field("groups", &self.groups)
            .field("global", &self.global)
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use relay_core::{BoxError, Response, Update};

    use super::*;
    use crate::context::Request;
    use crate::container::HandlerRegistry;
    use crate::handler::into_handler;
    use crate::middleware::{Next, from_fn};
    use crate::routing::{GroupAttributes, RouteDefinition, RouteParams, RouteRegistrar};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records entry, exit, and termination.
    struct Tracer {
        label: &'static str,
        log: Log,
        terminable: bool,
        fail_terminate: bool,
    }

    impl Tracer {
        fn new(label: &'static str, log: &Log) -> Self {
            Self {
                label,
                log: Arc::clone(log),
                terminable: true,
                fail_terminate: false,
            }
        }
    }

    #[async_trait]
    impl Middleware for Tracer {
        async fn handle(
            &self,
            req: Arc<Request>,
            next: Next,
            args: &[String],
        ) -> Result<Response, BoxError> {
            self.log.lock().push(format!("{}>{}", self.label, args.join(",")));
            let res = next.run(req).await;
            self.log.lock().push(format!("<{}", self.label));
            res
        }

        fn is_terminable(&self) -> bool {
            self.terminable
        }

        async fn terminate(
            &self,
            _req: &Request,
            _res: &Response,
            _args: &[String],
        ) -> Result<(), BoxError> {
            self.log.lock().push(format!("terminate {}", self.label));
            if self.fail_terminate {
                return Err("terminate failed".into());
            }
            Ok(())
        }
    }

    fn route(def: RouteDefinition) -> Arc<Route> {
        let mut r = RouteRegistrar::new();
        r.add(def.handler(|| async { "done" })).unwrap()
    }

    fn request(route: &Arc<Route>) -> Arc<Request> {
        Arc::new(Request::new(
            Arc::new(Update::text(1, "go")),
            Arc::clone(route),
            RouteParams::default(),
            HashMap::new(),
            Arc::new(HandlerRegistry::new()),
        ))
    }

    fn names(specs: &[MiddlewareSpec]) -> Vec<String> {
        specs.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_gather_order_and_groups() {
        let log = Log::default();
        let registry = MiddlewareRegistry::new()
            .alias("a", Tracer::new("a", &log))
            .alias("b", Tracer::new("b", &log))
            .alias("c", Tracer::new("c", &log))
            .group("web", ["b", "c"])
            .global("a");
        let route = route(RouteDefinition::text("go").middleware("web"));
        assert_eq!(names(&registry.gather(&route, &[])), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_exclusions() {
        let registry = MiddlewareRegistry::new().global("log").global("session");
        let route = route(
            RouteDefinition::text("go")
                .middleware("auth")
                .without_middleware("session"),
        );
        assert_eq!(names(&registry.gather(&route, &[])), vec!["log", "auth"]);
        assert_eq!(names(&registry.gather(&route, &["log".into()])), vec!["auth"]);
    }

    #[test]
    fn test_exact_duplicates_removed_after_sort() {
        let registry = MiddlewareRegistry::new()
            .global("auth")
            .priority(["session", "auth"]);
        let mut r = RouteRegistrar::new();
        r.push(GroupAttributes::new().middleware("auth").middleware("role:admin"));
        let route = r
            .add(
                RouteDefinition::text("go")
                    .middleware("session")
                    .middleware("role:mod")
                    .handler(|| async {}),
            )
            .unwrap();
        assert_eq!(
            names(&registry.gather(&route, &[])),
            vec!["session", "auth", "role:admin", "role:mod"]
        );
    }

    #[test]
    fn test_self_referencing_group_terminates() {
        let registry = MiddlewareRegistry::new().group("loop", ["loop", "x"]);
        let route = route(RouteDefinition::text("go").middleware("loop"));
        assert_eq!(names(&registry.gather(&route, &[])), vec!["x"]);
    }

    #[test]
    fn test_unknown_alias_fails() {
        let registry = MiddlewareRegistry::new();
        let route = route(RouteDefinition::text("go").middleware("ghost"));
        assert!(matches!(
            registry.build(&route, &[]),
            Err(DispatchError::UnknownMiddleware(name)) if name == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_onion_order_and_terminate() {
        let log = Log::default();
        let mut failing = Tracer::new("b", &log);
        failing.fail_terminate = true;
        let mut plain = Tracer::new("c", &log);
        plain.terminable = false;
        let registry = MiddlewareRegistry::new()
            .alias("a", Tracer::new("a", &log))
            .alias("b", failing)
            .alias("c", plain)
            .alias("d", Tracer::new("d", &log));
        let route = route(
            RouteDefinition::text("go")
                .middleware("a:1")
                .middleware("b")
                .middleware("c")
                .middleware("d"),
        );
        let chain = registry.build(&route, &[]).unwrap();
        let req = request(&route);
        let (result, executed) = chain
            .run(Arc::clone(&req), into_handler(|| async { "done" }))
            .await;
        let res = result.unwrap();
        assert_eq!(res.as_text(), Some("done"));
        assert_eq!(executed, vec![0, 1, 2, 3]);

        let failures = chain.terminate(&req, &res, &executed).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "b");
        assert_eq!(
            *log.lock(),
            vec![
                "a>1", "b>", "c>", "d>", "<d", "<c", "<b", "<a",
                "terminate a", "terminate b", "terminate d",
            ]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_terminate() {
        let log = Log::default();
        let stop = from_fn(|_req: Arc<Request>, _next: Next| async {
            Ok::<_, BoxError>(Response::rejected("stopped"))
        });
        let registry = MiddlewareRegistry::new()
            .alias("a", Tracer::new("a", &log))
            .alias("stop", stop)
            .alias("z", Tracer::new("z", &log));
        let route = route(
            RouteDefinition::text("go")
                .middleware("a")
                .middleware("stop")
                .middleware("z"),
        );
        let chain = registry.build(&route, &[]).unwrap();
        let req = request(&route);
        let (result, executed) = chain
            .run(Arc::clone(&req), into_handler(|| async { "done" }))
            .await;
        let res = result.unwrap();
        assert_eq!(res.as_text(), Some("stopped"));
        assert_eq!(executed, vec![0, 1]);

        chain.terminate(&req, &res, &executed).await;
        assert_eq!(*log.lock(), vec!["a>", "<a", "terminate a"]);
    }
}
