//! Working memory — per-user session state.
//!
//! One [`WorkingMemory`] exists per user id. It holds the persistent
//! conversation history, the per-request recall slots and scratch fields,
//! and the outbound notification queue. The store that hands instances out
//! lives in `mindloop-memory`; this module is just the state itself.
//!
//! Mutation discipline: the pipeline is the sole writer of the recall slots
//! and scratch fields during a request, and history is appended only by the
//! pipeline's finalization step. The store wraps each instance in a mutex,
//! so requests for the same user are serialized.

use tokio::sync::mpsc;
use tracing::warn;

use crate::message::{
    ConversationTurn, MemoryCitation, RecalledMemories, UserMessage, Who, Why,
};
use crate::notify::Notification;
use crate::vector::{MemoryHit, Tier};

/// Per-user mutable session state.
#[derive(Debug)]
pub struct WorkingMemory {
    user_id: String,

    /// Ordered conversation turns. Append-only; never reordered.
    pub history: Vec<ConversationTurn>,

    /// Recall slots, overwritten on every pipeline run.
    pub episodic: Vec<MemoryHit>,
    pub declarative: Vec<MemoryHit>,
    pub procedural: Vec<MemoryHit>,

    /// Request-scoped scratch: the message being processed.
    pub current_message: Option<UserMessage>,

    /// Request-scoped scratch: the (possibly hook-rewritten) recall query.
    pub recall_query: Option<String>,

    /// Request-scoped scratch: the query embedding, computed once per request.
    pub recall_embedding: Option<Vec<f32>>,

    /// Free-form scratch for hooks. Cleared each request.
    pub extras: serde_json::Map<String, serde_json::Value>,

    notifications: mpsc::UnboundedSender<Notification>,
    inbox: Option<mpsc::UnboundedReceiver<Notification>>,
}

impl WorkingMemory {
    pub fn new(user_id: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            user_id: user_id.into(),
            history: Vec::new(),
            episodic: Vec::new(),
            declarative: Vec::new(),
            procedural: Vec::new(),
            current_message: None,
            recall_query: None,
            recall_embedding: None,
            extras: serde_json::Map::new(),
            notifications: tx,
            inbox: Some(rx),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Reset the request-scoped scratch and store the inbound message.
    /// Recall slots keep their previous content until recall overwrites them.
    pub fn begin_request(&mut self, message: UserMessage) {
        self.recall_query = None;
        self.recall_embedding = None;
        self.extras.clear();
        self.current_message = Some(message);
    }

    /// The text of the message currently being processed, if any.
    pub fn current_text(&self) -> Option<&str> {
        self.current_message.as_ref().map(|m| m.text.as_str())
    }

    // ── Recall slots ──

    pub fn recalled(&self, tier: Tier) -> &[MemoryHit] {
        match tier {
            Tier::Episodic => &self.episodic,
            Tier::Declarative => &self.declarative,
            Tier::Procedural => &self.procedural,
        }
    }

    pub fn set_recalled(&mut self, tier: Tier, hits: Vec<MemoryHit>) {
        match tier {
            Tier::Episodic => self.episodic = hits,
            Tier::Declarative => self.declarative = hits,
            Tier::Procedural => self.procedural = hits,
        }
    }

    /// Snapshot the three recall slots as why-block citations.
    pub fn citations(&self) -> RecalledMemories {
        RecalledMemories {
            episodic: self.episodic.iter().map(MemoryCitation::from).collect(),
            declarative: self.declarative.iter().map(MemoryCitation::from).collect(),
            procedural: self.procedural.iter().map(MemoryCitation::from).collect(),
        }
    }

    // ── Conversation history ──

    /// Append a turn. History is append-only; there is no removal API.
    pub fn push_turn(&mut self, who: Who, message: impl Into<String>, why: Option<Why>) {
        self.history.push(ConversationTurn::new(who, message, why));
    }

    // ── Notifications ──

    /// Non-blocking enqueue onto this user's notification queue.
    pub fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            // Receiver gone: the transport dropped its end. Nothing to do
            // but note it; notifications are fire-and-forget.
            warn!(user_id = %self.user_id, "dropping notification, consumer is gone");
        }
    }

    /// A cloneable producer handle, e.g. for token-streaming sinks.
    pub fn notification_sender(&self) -> mpsc::UnboundedSender<Notification> {
        self.notifications.clone()
    }

    /// Claim the consumer end of the queue. Yields `Some` exactly once; the
    /// transport layer owns the receiver from then on.
    pub fn take_inbox(&mut self) -> Option<mpsc::UnboundedReceiver<Notification>> {
        self.inbox.take()
    }
}
