use async_trait::async_trait;

use relay_core::BoxError;

use super::BoundEntity;

/// A model type that route parameters can be bound to.
///
/// Usually derived:
///
/// ```rust,ignore
/// #[derive(Bindable)]
/// #[bind(param = "post", entity = "posts", key = "id")]
/// struct Post { id: u64, slug: String }
/// ```
pub trait Bindable: Send + Sync + Sized + 'static {
    /// The route parameter this model binds to.
    const PARAM: &'static str;
    /// The entity name passed to the repository.
    const ENTITY: &'static str;
    /// The field looked up when the pattern does not name one.
    const ROUTE_KEY: &'static str = "id";
    /// The relation name used when this model is resolved as a scoped child.
    const RELATION: &'static str = Self::ENTITY;
}

/// A closed set of values a route parameter may take.
pub trait RouteEnum: Sized + Send + 'static {
    /// The route parameter this enum binds to.
    const PARAM: &'static str;

    /// Every accepted raw value.
    fn route_values() -> &'static [&'static str];

    /// Parses a raw value, returning `None` for anything not in
    /// [`route_values`](Self::route_values).
    fn from_route_value(value: &str) -> Option<Self>;
}

/// One repository lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup<'a> {
    pub entity: &'a str,
    pub field: &'a str,
    pub value: &'a str,
    /// Include soft-deleted records.
    pub with_trashed: bool,
}

/// The persistence collaborator used for implicit binding.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Finds an entity by `lookup.field == lookup.value`.
    async fn find_by_key(&self, lookup: &Lookup<'_>) -> Result<Option<BoundEntity>, BoxError>;

    /// Finds an entity through `parent`'s `relation`.
    async fn find_related(
        &self,
        parent: &BoundEntity,
        relation: &str,
        lookup: &Lookup<'_>,
    ) -> Result<Option<BoundEntity>, BoxError>;
}
