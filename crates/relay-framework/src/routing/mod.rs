//! Route registration and matching.
//!
//! ```text
//! RouteRegistrar ──add()──▶ RouteCollection ──match_update()──▶ RouteMatch
//!   │ push()/pop() group frames        │ find_by_name()/generate()
//!   │ pattern() global constraints     │
//!   └ finish()                         └ cache::serialize()/deserialize()
//! ```

pub mod cache;
pub mod constraints;
mod collection;
mod group;
mod pattern;
mod route;

pub use collection::{RouteCollection, RouteMatch};
pub use constraints::Constraints;
pub use group::{EffectiveAttributes, GroupAttributes, RouteRegistrar, join_prefix};
pub use pattern::{CompiledPattern, DEFAULT_PARAM_REGEX, ParamSpec, Segment, SegmentSpec, Separator};
pub use route::{BindingOptions, Route, RouteDefinition, RouteParams};
