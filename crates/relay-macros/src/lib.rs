//! Procedural macros for the Relay bot framework.
//!
//! This crate provides:
//!
//! - `#[derive(Bindable)]` - Makes a model bindable from a route parameter
//! - `#[derive(RouteEnum)]` - Makes a unit enum bindable from a closed set of
//!   route values
//!
//! The generated code refers to `::relay_framework`, so the deriving crate
//! must depend on `relay-framework` (directly or through `relay`).

mod bindable;
mod case;
mod route_enum;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Implements `Bindable` for a struct.
///
/// # Attributes
///
/// - `#[bind(param = "...")]` - Route parameter name (default: the type name
///   in snake_case)
/// - `#[bind(entity = "...")]` - Entity passed to the repository (default:
///   the snake_case name plus `s`)
/// - `#[bind(key = "...")]` - Field looked up by default (default: `"id"`)
/// - `#[bind(relation = "...")]` - Relation used for scoped binding
///   (default: the entity)
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Bindable)]
/// #[bind(key = "slug")]
/// struct BlogPost {
///     slug: String,
/// }
/// // PARAM = "blog_post", ENTITY = "blog_posts", ROUTE_KEY = "slug"
/// ```
#[proc_macro_derive(Bindable, attributes(bind))]
pub fn derive_bindable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match bindable::derive_bindable(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Implements `RouteEnum` for an enum of unit variants.
///
/// # Attributes
///
/// - `#[route(param = "...")]` on the enum - Route parameter name (default:
///   the type name in snake_case)
/// - `#[route(rename = "...")]` on a variant - Route value (default: the
///   variant name in snake_case)
///
/// # Example
///
/// ```rust,ignore
/// #[derive(RouteEnum)]
/// enum Category {
///     News,
///     #[route(rename = "dev-log")]
///     DevLog,
/// }
/// // accepts "news" and "dev-log" for {category}
/// ```
#[proc_macro_derive(RouteEnum, attributes(route))]
pub fn derive_route_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match route_enum::derive_route_enum(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
