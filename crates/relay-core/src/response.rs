//! Abstract response produced by a dispatch.
//!
//! The router never sends anything itself. Handlers and middleware produce a
//! [`Response`]; a transport collaborator decides how to deliver it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Meta key carrying the number of seconds until a rate limit resets.
pub const RETRY_AFTER: &str = "retry-after";

/// Outcome classification of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    Ok,
    /// A bound entity could not be resolved.
    NotFound,
    /// A rate limit rejected the update.
    TooManyAttempts,
    /// A middleware refused to continue.
    Rejected,
}

/// What should be sent back, if anything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Reply {
    #[default]
    None,
    Text(String),
    Json(Value),
}

/// The abstract response value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Response {
    status: ResponseStatus,
    body: Reply,
    #[serde(default)]
    meta: BTreeMap<String, String>,
}

impl Response {
    /// An empty successful response.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A successful text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            body: Reply::Text(text.into()),
            ..Self::default()
        }
    }

    /// A successful JSON reply.
    pub fn json(value: Value) -> Self {
        Self {
            body: Reply::Json(value),
            ..Self::default()
        }
    }

    /// The default rejection for an exceeded rate limit.
    pub fn too_many_attempts(retry_after_secs: u64) -> Self {
        Self::text("Too many attempts. Please slow down.")
            .with_status(ResponseStatus::TooManyAttempts)
            .with_meta(RETRY_AFTER, retry_after_secs.to_string())
    }

    /// A rejection with a message.
    pub fn rejected(text: impl Into<String>) -> Self {
        Self::text(text).with_status(ResponseStatus::Rejected)
    }

    /// The default reply when a bound parameter resolves to nothing.
    pub fn not_found() -> Self {
        Self::text("Not found.").with_status(ResponseStatus::NotFound)
    }

    pub fn with_status(mut self, status: ResponseStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn body(&self) -> &Reply {
        &self.body
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    /// The reply text, if the body is text.
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            Reply::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Returns `true` if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        matches!(self.body, Reply::None)
    }
}

impl From<Reply> for Response {
    fn from(body: Reply) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }
}
