//! # Relay Core
//!
//! Foundation types shared by every Relay crate:
//!
//! - [`Update`]: the typed envelope for an inbound event, classified by [`Verb`]
//! - [`Response`]: the abstract value a dispatch produces
//! - [`BoxError`]: the error type handlers and middleware propagate

pub mod error;
pub mod response;
pub mod update;

pub use error::{BoxError, UnknownVerb};
pub use response::{RETRY_AFTER, Reply, Response, ResponseStatus};
pub use update::{CallbackQuery, Chat, InlineQuery, Message, Sender, Update, UpdateKind, Verb};
