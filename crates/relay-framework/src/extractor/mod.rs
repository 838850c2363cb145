//! Extractor system for the Relay framework.
//!
//! Handler arguments are extracted from the [`Request`](crate::context::Request)
//! through the [`FromContext`] trait. Built-in extractors:
//!
//! | extractor         | yields                                          |
//! |-------------------|-------------------------------------------------|
//! | `Arc<Update>`     | the inbound update                              |
//! | `RouteParams`     | every captured parameter                        |
//! | `Path<(A, B..)>`  | captured values parsed with `FromStr`, in order |
//! | `Model<T>`        | a bound model instance                          |
//! | `EnumParam<T>`    | a validated enum parameter                      |
//! | `Dep<T>`          | a service from the container                    |
//! | `Option<T>`       | `None` instead of an extraction error           |
//!
//! If an extractor fails, the dispatch fails with the extraction error.

mod core;
mod model;
mod params;
mod service;

pub use self::core::FromContext;
pub use model::{EnumParam, Model};
pub use params::{FromParams, Path, PathValue};
pub use service::Dep;
