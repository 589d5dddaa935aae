//! Outbound notification posting and token streaming.
//!
//! Messages not tied to the synchronous reply (ingestion-finished notices,
//! streamed tokens, background errors) ride the per-user notification
//! queue. Enqueueing never blocks; consumption belongs to the transport.

use std::sync::Arc;
use tokio::sync::mpsc;

use mindloop_core::error::NotifyError;
use mindloop_core::notify::{Notification, NotifyKind};
use mindloop_core::provider::TokenSink;
use mindloop_core::session::WorkingMemory;
use mindloop_memory::WorkingMemoryStore;

/// Posts notifications onto user queues.
pub struct NotificationChannel {
    sessions: Arc<WorkingMemoryStore>,
}

impl NotificationChannel {
    pub fn new(sessions: Arc<WorkingMemoryStore>) -> Self {
        Self { sessions }
    }

    /// Enqueue onto the given session's queue.
    pub fn post(&self, memory: &WorkingMemory, content: impl Into<String>, kind: NotifyKind) {
        memory.notify(Notification::of_kind(kind, content));
    }

    /// Enqueue with a string kind, as received from untyped callers.
    /// An unrecognized kind is rejected, never silently defaulted.
    pub fn post_raw_kind(
        &self,
        memory: &WorkingMemory,
        content: impl Into<String>,
        kind: &str,
    ) -> Result<(), NotifyError> {
        let kind: NotifyKind = kind.parse()?;
        self.post(memory, content, kind);
        Ok(())
    }

    /// Enqueue for the shared default user, for callers with no session at
    /// hand (e.g. background jobs).
    pub async fn post_default(&self, content: impl Into<String>, kind: NotifyKind) {
        let session = self.sessions.get_or_create_default().await;
        let memory = session.lock().await;
        self.post(&memory, content, kind);
    }
}

/// A [`TokenSink`] that forwards each generated token to a user's
/// notification queue as a `chat_token` message.
///
/// Holds only the queue's producer handle, so it can run while the
/// session itself is locked by the in-flight request.
pub struct QueueTokenSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl QueueTokenSink {
    pub fn for_session(memory: &WorkingMemory) -> Self {
        Self {
            sender: memory.notification_sender(),
        }
    }
}

impl TokenSink for QueueTokenSink {
    fn on_token(&self, token: &str) {
        // Fire-and-forget: a gone consumer must not stall generation.
        let _ = self
            .sender
            .send(Notification::of_kind(NotifyKind::ChatToken, token));
    }
}
