use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, trace};

use relay_core::BoxError;

use super::{BindingHint, BindingKind, BoundEntity, BoundValue, Lookup, NotFoundPolicy, Repository};
use crate::error::BindingError;
use crate::routing::{Route, RouteParams};

type Resolver =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Option<BoundEntity>, BoxError>> + Send + Sync>;

/// Resolves captured parameters into bound values.
#[derive(Clone, Default)]
pub struct Binder {
    explicit: HashMap<String, Resolver>,
    keys: HashMap<String, String>,
    repository: Option<Arc<dyn Repository>>,
    policy: NotFoundPolicy,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an explicit resolver for `param`.
    ///
    /// Explicit resolvers take precedence over enum and implicit binding.
    pub fn bind<F, Fut, T>(&mut self, param: impl Into<String>, resolver: F) -> &mut Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
        T: Any + Send + Sync,
    {
        let param = param.into();
        let entity = param.clone();
        let resolver = Arc::new(resolver);
        self.explicit.insert(
            param,
            Arc::new(move |raw: String| {
                let resolver = Arc::clone(&resolver);
                let entity = entity.clone();
                async move { Ok(resolver(raw).await.map(|value| BoundEntity::new(entity, value))) }
                    .boxed()
            }),
        );
        self
    }

    /// Registers a fallible explicit resolver for `param`.
    pub fn bind_fallible<F, Fut, T, E>(
        &mut self,
        param: impl Into<String>,
        resolver: F,
    ) -> &mut Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
        T: Any + Send + Sync,
        E: Into<BoxError>,
    {
        let param = param.into();
        let entity = param.clone();
        let resolver = Arc::new(resolver);
        self.explicit.insert(
            param,
            Arc::new(move |raw: String| {
                let resolver = Arc::clone(&resolver);
                let entity = entity.clone();
                async move {
                    let value = resolver(raw).await.map_err(Into::into)?;
                    Ok(value.map(|value| BoundEntity::new(entity, value)))
                }
                .boxed()
            }),
        );
        self
    }

    /// Looks `param` up by `field` instead of the entity's route key.
    ///
    /// A field given in the pattern (`{post:slug}`) still wins.
    pub fn key_for(&mut self, param: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.keys.insert(param.into(), field.into());
        self
    }

    pub fn repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn not_found(mut self, policy: NotFoundPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> NotFoundPolicy {
        self.policy
    }

    pub fn has_explicit(&self, param: &str) -> bool {
        self.explicit.contains_key(param)
    }

    /// Binds every captured parameter that has an explicit resolver or a hint.
    ///
    /// Parameters are resolved in capture order. Absent optionals and
    /// parameters nothing asked for stay raw.
    pub async fn resolve(
        &self,
        route: &Route,
        params: &RouteParams,
        hints: &[BindingHint],
    ) -> Result<HashMap<String, BoundValue>, BindingError> {
        let mut bound = HashMap::new();
        // `Some(None)`: an earlier entity parameter was looked up and came back empty.
        let mut parent: Option<Option<BoundEntity>> = None;

        for spec in route.pattern().params() {
            let name = spec.name.as_str();
            let Some(raw) = params.get(name) else {
                continue;
            };
            let hint = hints.iter().find(|h| h.param == name);
            let binds_entity = self.explicit.contains_key(name)
                || matches!(hint.map(|h| &h.kind), Some(BindingKind::Entity { .. }));

            let value = if let Some(resolver) = self.explicit.get(name) {
                trace!(param = name, "explicit binding");
                resolver(raw.to_string())
                    .await
                    .map_err(|source| BindingError::Repository {
                        param: name.to_string(),
                        source,
                    })?
                    .map(BoundValue::Entity)
            } else {
                match hint.map(|h| &h.kind) {
                    None => continue,
                    Some(&BindingKind::Enum { values }) => values
                        .iter()
                        .any(|v| *v == raw)
                        .then(|| BoundValue::Enum(raw.to_string())),
                    Some(&BindingKind::Entity {
                        entity,
                        route_key,
                        relation,
                    }) => {
                        let field = spec
                            .field
                            .as_deref()
                            .or_else(|| self.keys.get(name).map(String::as_str))
                            .unwrap_or(route_key);
                        let scoped = route
                            .binding()
                            .scope_bindings
                            .unwrap_or(spec.field.is_some());
                        let lookup = Lookup {
                            entity,
                            field,
                            value: raw,
                            with_trashed: route.binding().with_trashed,
                        };
                        match (scoped, &parent) {
                            (true, Some(None)) => {
                                trace!(param = name, "scoped parent is missing, skipping lookup");
                                None
                            }
                            (true, Some(Some(scope))) => self
                                .find(name, &lookup, Some(scope), relation)
                                .await?
                                .map(BoundValue::Entity),
                            _ => self
                                .find(name, &lookup, None, relation)
                                .await?
                                .map(BoundValue::Entity),
                        }
                    }
                }
            };

            match value {
                Some(value) => {
                    if let BoundValue::Entity(entity) = &value {
                        parent = Some(Some(entity.clone()));
                    }
                    bound.insert(name.to_string(), value);
                }
                None => match self.policy {
                    NotFoundPolicy::Abort => {
                        debug!(param = name, value = raw, "binding not found, aborting");
                        return Err(BindingError::not_found(name));
                    }
                    NotFoundPolicy::Null => {
                        debug!(param = name, value = raw, "binding not found, passing null");
                        if binds_entity {
                            parent = Some(None);
                        }
                        bound.insert(name.to_string(), BoundValue::Missing);
                    }
                },
            }
        }

        Ok(bound)
    }

    async fn find(
        &self,
        param: &str,
        lookup: &Lookup<'_>,
        parent: Option<&BoundEntity>,
        relation: &str,
    ) -> Result<Option<BoundEntity>, BindingError> {
        let repository = self.repository.as_ref().ok_or_else(|| BindingError::Repository {
            param: param.to_string(),
            source: "no repository configured for implicit binding".into(),
        })?;
        let found = match parent {
            Some(parent) => {
                trace!(param, parent = parent.entity(), relation, "scoped binding");
                repository.find_related(parent, relation, lookup).await
            }
            None => repository.find_by_key(lookup).await,
        };
        found.map_err(|source| BindingError::Repository {
            param: param.to_string(),
            source,
        })
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut explicit: Vec<&String> = self.explicit.keys().collect();
        explicit.sort();
        f.debug_struct("Binder")
            .field("explicit", &explicit)
            .field("keys", &self.keys)
            .field("repository", &self.repository.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}
