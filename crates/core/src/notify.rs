//! Outbound notification types.
//!
//! Notifications ride the per-user queue in working memory and are consumed
//! by the transport layer. Delivery is out of scope here; this module only
//! fixes the payload shapes and the valid kinds.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::NotifyError;

/// The valid outbound message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyKind {
    /// Out-of-band status message (e.g. "finished ingesting your file").
    Notification,
    /// A chat reply delivered asynchronously.
    Chat,
    /// A single streamed token of an in-flight reply.
    ChatToken,
    /// An error surfaced to the client.
    Error,
}

impl FromStr for NotifyKind {
    type Err = NotifyError;

    /// Strict parsing: an unrecognized kind is a programming error and must
    /// fail loudly rather than silently defaulting.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notification" => Ok(NotifyKind::Notification),
            "chat" => Ok(NotifyKind::Chat),
            "chat_token" => Ok(NotifyKind::ChatToken),
            "error" => Ok(NotifyKind::Error),
            other => Err(NotifyError::UnknownKind(other.into())),
        }
    }
}

/// An outbound message, shaped by kind.
///
/// Error notifications carry a fixed category name plus a description; the
/// other kinds carry raw content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Notification { content: String },
    Chat { content: String },
    ChatToken { content: String },
    Error { name: String, description: String },
}

impl Notification {
    /// Build a notification of the given kind from raw content.
    pub fn of_kind(kind: NotifyKind, content: impl Into<String>) -> Self {
        let content = content.into();
        match kind {
            NotifyKind::Notification => Notification::Notification { content },
            NotifyKind::Chat => Notification::Chat { content },
            NotifyKind::ChatToken => Notification::ChatToken { content },
            NotifyKind::Error => Notification::Error {
                name: "GenericError".into(),
                description: content,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_known_kinds_parse() {
        for (s, kind) in [
            ("notification", NotifyKind::Notification),
            ("chat", NotifyKind::Chat),
            ("chat_token", NotifyKind::ChatToken),
            ("error", NotifyKind::Error),
        ] {
            assert_eq!(s.parse::<NotifyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "broadcast".parse::<NotifyKind>().unwrap_err();
        assert_eq!(err, NotifyError::UnknownKind("broadcast".into()));
    }

    #[test]
    fn error_kind_wraps_with_generic_name() {
        let n = Notification::of_kind(NotifyKind::Error, "it broke");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["name"], "GenericError");
        assert_eq!(json["description"], "it broke");
    }

    #[test]
    fn chat_token_carries_raw_content() {
        let n = Notification::of_kind(NotifyKind::ChatToken, "hel");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "chat_token");
        assert_eq!(json["content"], "hel");
    }
}
