use std::ops::Deref;
use std::sync::Arc;

use super::FromContext;
use crate::binding::{Bindable, BindingHint, BindingKind, BoundValue, RouteEnum};
use crate::context::Request;
use crate::error::{ExtractError, ExtractResult};

/// A model bound from the route parameter named [`Bindable::PARAM`].
///
/// Declaring this argument is what makes the binder resolve the parameter.
/// Use `Option<Model<T>>` when the not-found policy passes `null` through.
#[derive(Debug)]
pub struct Model<T>(pub Arc<T>);

impl<T> Model<T> {
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T> Clone for Model<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Model<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Bindable> FromContext for Model<T> {
    fn from_context(req: &Request) -> ExtractResult<Self> {
        match req.bound(T::PARAM) {
            Some(BoundValue::Entity(entity)) => entity
                .downcast::<T>()
                .map(Model)
                .ok_or_else(|| ExtractError::InvalidParam {
                    param: T::PARAM.to_string(),
                    reason: format!(
                        "bound '{}' is not a {}",
                        entity.entity(),
                        std::any::type_name::<T>()
                    ),
                }),
            _ => Err(ExtractError::NotBound(T::PARAM.to_string())),
        }
    }

    fn binding_hint() -> Option<BindingHint> {
        Some(BindingHint {
            param: T::PARAM,
            kind: BindingKind::Entity {
                entity: T::ENTITY,
                route_key: T::ROUTE_KEY,
                relation: T::RELATION,
            },
        })
    }
}

/// An enum bound from the route parameter named [`RouteEnum::PARAM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumParam<T>(pub T);

impl<T> Deref for EnumParam<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: RouteEnum> FromContext for EnumParam<T> {
    fn from_context(req: &Request) -> ExtractResult<Self> {
        match req.bound(T::PARAM) {
            Some(BoundValue::Enum(raw)) => T::from_route_value(raw)
                .map(EnumParam)
                .ok_or_else(|| ExtractError::NotBound(T::PARAM.to_string())),
            _ => Err(ExtractError::NotBound(T::PARAM.to_string())),
        }
    }

    fn binding_hint() -> Option<BindingHint> {
        Some(BindingHint {
            param: T::PARAM,
            kind: BindingKind::Enum {
                values: T::route_values(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use relay_core::Update;

    use super::*;
    use crate::binding::BoundEntity;
    use crate::container::HandlerRegistry;
    use crate::context::testing::request_with;

    #[derive(Debug, PartialEq)]
    struct Post {
        id: u64,
    }

    impl Bindable for Post {
        const PARAM: &'static str = "post";
        const ENTITY: &'static str = "posts";
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Dir {
        Up,
        Down,
    }

    impl RouteEnum for Dir {
        const PARAM: &'static str = "dir";

        fn route_values() -> &'static [&'static str] {
            &["up", "down"]
        }

        fn from_route_value(value: &str) -> Option<Self> {
            match value {
                "up" => Some(Self::Up),
                "down" => Some(Self::Down),
                _ => None,
            }
        }
    }

    #[test]
    fn test_model_hint() {
        let hint = Model::<Post>::binding_hint().unwrap();
        assert_eq!(hint.param, "post");
        assert_eq!(
            hint.kind,
            BindingKind::Entity {
                entity: "posts",
                route_key: "id",
                relation: "posts"
            }
        );
        assert_eq!(Option::<Model<Post>>::binding_hint(), Some(hint));
    }

    #[test]
    fn test_model_extracts_bound_entity() {
        let bound = HashMap::from([(
            "post".to_string(),
            BoundValue::Entity(BoundEntity::of(Post { id: 5 })),
        )]);
        let req = request_with("post {post}", Update::text(1, "post 5"), bound, HandlerRegistry::new());
        let post = Model::<Post>::from_context(&req).unwrap();
        assert_eq!(post.id, 5);
    }

    #[test]
    fn test_missing_model_is_not_bound() {
        let bound = HashMap::from([("post".to_string(), BoundValue::Missing)]);
        let req = request_with("post {post}", Update::text(1, "post 5"), bound, HandlerRegistry::new());
        assert!(matches!(
            Model::<Post>::from_context(&req),
            Err(ExtractError::NotBound(_))
        ));
        assert!(Option::<Model<Post>>::from_context(&req).unwrap().is_none());
    }

    #[test]
    fn test_enum_param() {
        let bound = HashMap::from([("dir".to_string(), BoundValue::Enum("down".into()))]);
        let req = request_with("vote:{dir}", Update::callback(1, "vote:down"), bound, HandlerRegistry::new());
        assert_eq!(*EnumParam::<Dir>::from_context(&req).unwrap(), Dir::Down);
    }
}
