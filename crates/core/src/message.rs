//! Message and output domain types.
//!
//! These are the value objects that flow through a request cycle:
//! a [`UserMessage`] comes in, [`ConversationTurn`]s accumulate in working
//! memory, and a [`FinalOutput`] goes back to the transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::IntermediateStep;
use crate::vector::MemoryHit;

/// The shared anonymous user id, used when a client supplies none.
pub const DEFAULT_USER_ID: &str = "user";

/// An inbound user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub text: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Transport- or hook-supplied extras, carried through untouched.
    #[serde(default, flatten)]
    pub metadata: Map<String, Value>,
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.into()
}

impl UserMessage {
    /// A message from the shared anonymous user.
    pub fn new(text: impl Into<String>) -> Self {
        Self::for_user(DEFAULT_USER_ID, text)
    }

    pub fn for_user(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            text: text.into(),
            user_id: if user_id.is_empty() {
                DEFAULT_USER_ID.into()
            } else {
                user_id
            },
            metadata: Map::new(),
        }
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Who {
    Human,
    #[serde(rename = "AI")]
    Ai,
}

impl std::fmt::Display for Who {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Who::Human => f.write_str("Human"),
            Who::Ai => f.write_str("AI"),
        }
    }
}

/// One entry of the per-user conversation history. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub who: Who,
    pub message: String,

    /// Present on AI turns: the reasoning and recall context behind the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<Why>,

    pub when: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(who: Who, message: impl Into<String>, why: Option<Why>) -> Self {
        Self {
            who,
            message: message.into(),
            why,
            when: Utc::now(),
        }
    }
}

/// A recalled memory as reported in the why-block: the document enriched
/// with its similarity score and vector-store id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCitation {
    pub page_content: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    pub score: f32,
    pub id: String,
}

impl From<&MemoryHit> for MemoryCitation {
    fn from(hit: &MemoryHit) -> Self {
        Self {
            page_content: hit.document.page_content.clone(),
            metadata: hit.document.metadata.clone(),
            score: hit.score,
            id: hit.id.clone(),
        }
    }
}

/// The three per-tier citation lists of a why-block, in canonical tier order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecalledMemories {
    pub episodic: Vec<MemoryCitation>,
    pub declarative: Vec<MemoryCitation>,
    pub procedural: Vec<MemoryCitation>,
}

/// The reasoning trace attached to a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Why {
    /// The input the agent actually saw (post hooks and segmentation).
    pub input: String,

    pub intermediate_steps: Vec<IntermediateStep>,

    pub memory: RecalledMemories,
}

/// The structured result of one request cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FinalOutput {
    Chat {
        user_id: String,
        content: String,
        why: Why,
    },
    Error {
        name: String,
        description: String,
    },
}

impl FinalOutput {
    /// The terminal output for a recall failure: the vector store no longer
    /// matches the embedder and must be reset by the operator.
    pub fn vector_memory_error() -> Self {
        FinalOutput::Error {
            name: "VectorMemoryError".into(),
            description: "You probably changed the embedder and the old vector memory \
                          is not compatible. Please reset the long-term memory store."
                .into(),
        }
    }

    /// The text worth keeping in conversation history for this output.
    pub fn history_text(&self) -> &str {
        match self {
            FinalOutput::Chat { content, .. } => content,
            FinalOutput::Error { description, .. } => description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_user_id_falls_back_to_default() {
        let msg: UserMessage = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert_eq!(msg.user_id, DEFAULT_USER_ID);

        let msg = UserMessage::for_user("", "hi");
        assert_eq!(msg.user_id, DEFAULT_USER_ID);
    }

    #[test]
    fn message_metadata_flattens() {
        let msg: UserMessage =
            serde_json::from_str(r#"{"text": "hi", "user_id": "alice", "channel": "web"}"#)
                .unwrap();
        assert_eq!(msg.user_id, "alice");
        assert_eq!(msg.metadata["channel"], "web");
    }

    #[test]
    fn who_serializes_as_human_and_ai() {
        assert_eq!(serde_json::to_string(&Who::Human).unwrap(), r#""Human""#);
        assert_eq!(serde_json::to_string(&Who::Ai).unwrap(), r#""AI""#);
    }

    #[test]
    fn error_output_is_tagged() {
        let out = FinalOutput::vector_memory_error();
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["name"], "VectorMemoryError");
        assert!(json["description"].as_str().unwrap().contains("embedder"));
    }

    #[test]
    fn chat_output_roundtrip() {
        let out = FinalOutput::Chat {
            user_id: "alice".into(),
            content: "hello".into(),
            why: Why {
                input: "hi".into(),
                intermediate_steps: vec![],
                memory: RecalledMemories::default(),
            },
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["type"], "chat");
        let back: FinalOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back.history_text(), "hello");
    }
}
