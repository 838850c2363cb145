//! Update envelope for the Relay framework.
//!
//! Every inbound event is normalised into an [`Update`] before it reaches the
//! router. The envelope is a closed tagged union over the update kinds the
//! framework knows about, plus an [`UpdateKind::Unknown`] variant so that
//! newer upstream update types still deserialize.
//!
//! ```text
//! Update { id, sender, chat, kind }
//! └── UpdateKind
//!     ├── Message(Message)          → Verb::Text / Verb::Command
//!     ├── EditedMessage(Message)    → Verb::EditedMessage
//!     ├── CallbackQuery(..)         → Verb::CallbackQuery
//!     ├── InlineQuery(..)           → Verb::InlineQuery
//!     └── Unknown                   → Verb::Other
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownVerb;

// ============================================================================
// Verb
// ============================================================================

/// The update-kind tag a route answers to.
///
/// [`Verb::Match`] never appears on an incoming update; it is the route-side
/// wildcard that accepts every verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Plain text message.
    Text,
    /// Text message starting with `/`.
    Command,
    /// Inline keyboard button press.
    CallbackQuery,
    /// Inline mode query.
    InlineQuery,
    /// A previously sent message was edited.
    EditedMessage,
    /// Anything else.
    Other,
    /// Wildcard: matches every verb.
    Match,
}

impl Verb {
    /// All concrete verbs an update can carry.
    pub const CONCRETE: [Verb; 6] = [
        Verb::Text,
        Verb::Command,
        Verb::CallbackQuery,
        Verb::InlineQuery,
        Verb::EditedMessage,
        Verb::Other,
    ];

    /// Returns the canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Command => "command",
            Self::CallbackQuery => "callback_query",
            Self::InlineQuery => "inline_query",
            Self::EditedMessage => "edited_message",
            Self::Other => "other",
            Self::Match => "match",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "text" | "message" => Self::Text,
            "command" => Self::Command,
            "callback_query" | "callback" => Self::CallbackQuery,
            "inline_query" | "inline" => Self::InlineQuery,
            "edited_message" | "edited" => Self::EditedMessage,
            "other" => Self::Other,
            "match" | "any" | "*" => Self::Match,
            _ => return Err(UnknownVerb(s.to_string())),
        })
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// The user an update originates from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

/// The chat an update belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

/// A text-bearing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub text: Option<String>,
}

/// A button press carrying opaque callback data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message_id: Option<i64>,
}

/// An inline-mode query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub query: String,
}

/// The closed set of update kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    /// An update type this version does not model.
    #[serde(other)]
    Unknown,
}

/// The inbound event handed to the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Upstream update identifier.
    pub id: i64,
    #[serde(default)]
    pub sender: Option<Sender>,
    #[serde(default)]
    pub chat: Option<Chat>,
    pub kind: UpdateKind,
}

impl Update {
    /// Creates an update with no sender or chat.
    pub fn new(id: i64, kind: UpdateKind) -> Self {
        Self {
            id,
            sender: None,
            chat: None,
            kind,
        }
    }

    /// Shorthand for a text message update.
    ///
    /// Text starting with `/` is classified as [`Verb::Command`].
    pub fn text(id: i64, text: impl Into<String>) -> Self {
        Self::new(
            id,
            UpdateKind::Message(Message {
                message_id: id,
                text: Some(text.into()),
            }),
        )
    }

    /// Shorthand for a callback query update.
    pub fn callback(id: i64, data: impl Into<String>) -> Self {
        Self::new(
            id,
            UpdateKind::CallbackQuery(CallbackQuery {
                id: id.to_string(),
                data: Some(data.into()),
                message_id: None,
            }),
        )
    }

    /// Shorthand for an inline query update.
    pub fn inline(id: i64, query: impl Into<String>) -> Self {
        Self::new(
            id,
            UpdateKind::InlineQuery(InlineQuery {
                id: id.to_string(),
                query: query.into(),
            }),
        )
    }

    /// Attaches a sender.
    pub fn from_user(mut self, user_id: i64) -> Self {
        self.sender = Some(Sender {
            id: user_id,
            username: None,
            is_bot: false,
        });
        self
    }

    /// Attaches a chat.
    pub fn in_chat(mut self, chat_id: i64) -> Self {
        self.chat = Some(Chat {
            id: chat_id,
            title: None,
        });
        self
    }

    /// Classifies the update.
    pub fn verb(&self) -> Verb {
        match &self.kind {
            UpdateKind::Message(m) => match m.text.as_deref() {
                Some(t) if t.starts_with('/') => Verb::Command,
                Some(_) => Verb::Text,
                None => Verb::Other,
            },
            UpdateKind::EditedMessage(_) => Verb::EditedMessage,
            UpdateKind::CallbackQuery(_) => Verb::CallbackQuery,
            UpdateKind::InlineQuery(_) => Verb::InlineQuery,
            UpdateKind::Unknown => Verb::Other,
        }
    }

    /// The text that route patterns are matched against.
    pub fn payload(&self) -> &str {
        match &self.kind {
            UpdateKind::Message(m) | UpdateKind::EditedMessage(m) => m.text.as_deref(),
            UpdateKind::CallbackQuery(q) => q.data.as_deref(),
            UpdateKind::InlineQuery(q) => Some(q.query.as_str()),
            UpdateKind::Unknown => None,
        }
        .unwrap_or("")
    }

    /// The sender id, if any.
    pub fn sender_id(&self) -> Option<i64> {
        self.sender.as_ref().map(|s| s.id)
    }

    /// The chat id, if any.
    pub fn chat_id(&self) -> Option<i64> {
        self.chat.as_ref().map(|c| c.id)
    }
}
