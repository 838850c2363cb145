use std::sync::Arc;

use clap::Parser;

use super::split::command_argv;
use crate::context::Request;
use crate::error::{ExtractError, ExtractResult};
use crate::extractor::FromContext;

/// The update payload parsed as a clap command.
///
/// The payload is split by [`command_argv`] and handed to
/// [`Parser::try_parse_from`]; the first word (`/ban`) is the binary name. A parse failure carries clap's
/// rendered message, help and version output included.
///
/// ```rust,ignore
/// #[derive(Parser, Clone)]
/// struct Ban {
///     user: String,
///     #[arg(short, long, default_value_t = 0)]
///     days: u32,
/// }
///
/// r.add(
///     RouteDefinition::command("/ban {rest?}")
///         .where_("rest", ".*")
///         .handler(|cmd: CommandArgs<Ban>| async move {
///             format!("banned {} for {} days", cmd.user, cmd.days)
///         }),
/// )?;
/// ```
#[derive(Debug, Clone)]
pub struct CommandArgs<T: Parser>(pub T);

impl<T: Parser> CommandArgs<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Parser> std::ops::Deref for CommandArgs<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Parser> std::ops::DerefMut for CommandArgs<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// A parsed command cached in the request state.
struct ParsedCommand<T>(Arc<T>);

impl<T> Clone for ParsedCommand<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Parser + Clone + Send + Sync + 'static> FromContext for CommandArgs<T> {
    fn from_context(req: &Request) -> ExtractResult<Self> {
        if let Some(parsed) = req.get_state::<ParsedCommand<T>>() {
            return Ok(CommandArgs(T::clone(&parsed.0)));
        }
        let args = command_argv(req.update().payload());
        let parsed = T::try_parse_from(args)
            .map_err(|e| ExtractError::custom(e.render().to_string().trim_end().to_string()))?;
        req.set_state(ParsedCommand(Arc::new(parsed.clone())));
        Ok(CommandArgs(parsed))
    }
}
