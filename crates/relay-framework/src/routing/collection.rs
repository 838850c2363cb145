//! The ordered route table.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::trace;

use relay_core::{Update, Verb};

use super::route::{Route, RouteParams};
use crate::error::{GenerateError, RegistrationError};

/// A matched route and its captured parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: RouteParams,
}

/// Routes in registration order, plus a name index and at most one fallback.
///
/// Matching is first-match-wins in registration order; the fallback is only
/// considered after every other route has been tried.
#[derive(Debug, Clone, Default)]
pub struct RouteCollection {
    routes: Vec<Arc<Route>>,
    by_name: HashMap<String, usize>,
    fallback: Option<usize>,
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route.
    ///
    /// Fails on a duplicate name or a second fallback.
    pub fn register(&mut self, route: Route) -> Result<Arc<Route>, RegistrationError> {
        if let Some(name) = route.name()
            && self.by_name.contains_key(name)
        {
            return Err(RegistrationError::DuplicateName(name.to_string()));
        }
        if route.is_fallback() && self.fallback.is_some() {
            return Err(RegistrationError::FallbackAlreadyDefined);
        }

        let index = self.routes.len();
        if let Some(name) = route.name() {
            self.by_name.insert(name.to_string(), index);
        }
        if route.is_fallback() {
            self.fallback = Some(index);
        }
        let route = Arc::new(route);
        self.routes.push(Arc::clone(&route));
        Ok(route)
    }

    /// Finds the first route answering `verb` whose pattern matches `payload`.
    pub fn match_route(&self, verb: Verb, payload: &str) -> Option<RouteMatch> {
        let primary = self
            .routes
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != self.fallback)
            .map(|(_, r)| r);
        let fallback = self.fallback.and_then(|i| self.routes.get(i));

        primary.chain(fallback).find_map(|route| {
            if !route.answers(verb) {
                return None;
            }
            let captures = route.pattern().captures(payload)?;
            trace!(pattern = route.pattern().source(), "route matched");
            Some(RouteMatch {
                route: Arc::clone(route),
                params: RouteParams::new(captures),
            })
        })
    }

    /// Matches an update by its verb and payload.
    pub fn match_update(&self, update: &Update) -> Option<RouteMatch> {
        self.match_route(update.verb(), update.payload())
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Arc<Route>> {
        self.by_name.get(name).and_then(|&i| self.routes.get(i))
    }

    pub fn has_named(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Renders the payload that would match the named route.
    pub fn generate(
        &self,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, GenerateError> {
        let route = self
            .find_by_name(name)
            .ok_or_else(|| GenerateError::UnknownRoute(name.to_string()))?;
        route.pattern().generate(name, params)
    }

    pub fn fallback(&self) -> Option<&Arc<Route>> {
        self.fallback.and_then(|i| self.routes.get(i))
    }

    /// Routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{GroupAttributes, RouteDefinition, RouteRegistrar};

    async fn handler() {}

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_first_registered_wins() {
        let mut r = RouteRegistrar::new();
        r.add(RouteDefinition::text("user {id}").name("first").handler(handler))
            .unwrap();
        r.add(RouteDefinition::text("user {name}").name("second").handler(handler))
            .unwrap();
        let routes = r.finish().unwrap();

        let m = routes.match_route(Verb::Text, "user 5").unwrap();
        assert_eq!(m.route.name(), Some("first"));
        assert_eq!(m.params.get("id"), Some("5"));
    }

    #[test]
    fn test_verb_filters() {
        let mut r = RouteRegistrar::new();
        r.add(RouteDefinition::callback_query("vote:{dir}").handler(handler))
            .unwrap();
        r.add(RouteDefinition::any("ping").handler(handler)).unwrap();
        let routes = r.finish().unwrap();

        assert!(routes.match_route(Verb::Text, "vote:up").is_none());
        assert!(routes.match_route(Verb::CallbackQuery, "vote:up").is_some());
        assert!(routes.match_route(Verb::InlineQuery, "ping").is_some());
    }

    #[test]
    fn test_fallback_is_considered_last() {
        let mut r = RouteRegistrar::new();
        r.fallback(handler).unwrap();
        r.add(RouteDefinition::text("help").name("help").handler(handler))
            .unwrap();
        let routes = r.finish().unwrap();

        let m = routes.match_route(Verb::Text, "help").unwrap();
        assert_eq!(m.route.name(), Some("help"));

        let m = routes.match_route(Verb::Text, "anything else").unwrap();
        assert!(m.route.is_fallback());
        assert!(routes.match_route(Verb::CallbackQuery, "").unwrap().route.is_fallback());
    }

    #[test]
    fn test_no_match_without_fallback() {
        let mut r = RouteRegistrar::new();
        r.add(RouteDefinition::text("help").handler(handler)).unwrap();
        let routes = r.finish().unwrap();
        assert!(routes.match_route(Verb::Text, "helpme").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut r = RouteRegistrar::new();
        r.add(RouteDefinition::text("a").name("x").handler(handler))
            .unwrap();
        let err = r
            .add(RouteDefinition::text("b").name("x").handler(handler))
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateName("x".into()));
    }

    #[test]
    fn test_second_fallback_rejected() {
        let mut r = RouteRegistrar::new();
        r.fallback(handler).unwrap();
        assert_eq!(
            r.fallback(handler).unwrap_err(),
            RegistrationError::FallbackAlreadyDefined
        );
    }

    #[test]
    fn test_generate_named_route() {
        let mut r = RouteRegistrar::new();
        r.group(GroupAttributes::new().prefix("/admin/").name("admin."), |r| {
            r.add(
                RouteDefinition::command("ban {user} {days?}")
                    .where_number("days")
                    .name("ban")
                    .handler(handler),
            )?;
            Ok(())
        })
        .unwrap();
        let routes = r.finish().unwrap();

        let text = routes
            .generate("admin.ban", &params(&[("user", "bob")]))
            .unwrap();
        assert_eq!(text, "/admin/ban bob");
        assert!(routes.match_route(Verb::Command, &text).is_some());

        let text = routes
            .generate("admin.ban", &params(&[("user", "bob"), ("days", "3")]))
            .unwrap();
        assert_eq!(text, "/admin/ban bob 3");

        assert!(matches!(
            routes.generate("admin.ban", &params(&[])),
            Err(GenerateError::MissingParam { .. })
        ));
        assert!(matches!(
            routes.generate("admin.ban", &params(&[("user", "bob"), ("days", "x")])),
            Err(GenerateError::ConstraintViolation { .. })
        ));
        assert!(matches!(
            routes.generate("nope", &params(&[])),
            Err(GenerateError::UnknownRoute(_))
        ));
    }
}
