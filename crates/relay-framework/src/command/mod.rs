//! Clap-based command parsing.
//!
//! [`CommandArgs<T>`] parses the update payload with `T`'s clap definition.
//! The route pattern still decides which updates reach the handler; a
//! trailing optional parameter constrained to `.*` (`/ban {rest?}`) lets any
//! arguments through.

mod extractor;
pub mod split;

pub use extractor::CommandArgs;
pub use split::{command_argv, split_words};
