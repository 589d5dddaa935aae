//! The working-memory store: one session per user id.
//!
//! `get_or_create` is idempotent and never fails; concurrent calls for
//! different users don't interfere, and concurrent calls for the same user
//! resolve to the same instance. Sessions are handed out behind a mutex, so
//! two requests for the same user serialize instead of racing on the same
//! state (distinct users stay fully concurrent).
//!
//! The store never evicts. `user_count` exists so an operator can watch
//! growth; session expiry belongs to a layer above this core.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use mindloop_core::message::DEFAULT_USER_ID;
use mindloop_core::session::WorkingMemory;

/// A shared handle to one user's session.
pub type SharedWorkingMemory = Arc<Mutex<WorkingMemory>>;

/// The registry of live sessions.
#[derive(Default)]
pub struct WorkingMemoryStore {
    sessions: RwLock<HashMap<String, SharedWorkingMemory>>,
}

impl WorkingMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `user_id`, creating it on first sight.
    /// An empty id maps to the shared default user.
    pub async fn get_or_create(&self, user_id: &str) -> SharedWorkingMemory {
        let key = if user_id.is_empty() {
            DEFAULT_USER_ID
        } else {
            user_id
        };

        if let Some(session) = self.sessions.read().await.get(key) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(user_id = %key, "creating working memory");
                Arc::new(Mutex::new(WorkingMemory::new(key)))
            })
            .clone()
    }

    /// The session of the shared default user.
    pub async fn get_or_create_default(&self) -> SharedWorkingMemory {
        self.get_or_create(DEFAULT_USER_ID).await
    }

    pub async fn contains(&self, user_id: &str) -> bool {
        self.sessions.read().await.contains_key(user_id)
    }

    pub async fn user_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = WorkingMemoryStore::new();
        let first = store.get_or_create("alice").await;
        let second = store.get_or_create("alice").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn distinct_users_never_collide() {
        let store = WorkingMemoryStore::new();
        let alice = store.get_or_create("alice").await;
        let bob = store.get_or_create("bob").await;
        assert!(!Arc::ptr_eq(&alice, &bob));
        assert_eq!(alice.lock().await.user_id(), "alice");
        assert_eq!(bob.lock().await.user_id(), "bob");
        assert_eq!(store.user_count().await, 2);
    }

    #[tokio::test]
    async fn empty_user_id_maps_to_default() {
        let store = WorkingMemoryStore::new();
        let anonymous = store.get_or_create("").await;
        let default = store.get_or_create_default().await;
        assert!(Arc::ptr_eq(&anonymous, &default));
        assert_eq!(default.lock().await.user_id(), DEFAULT_USER_ID);
    }

    #[tokio::test]
    async fn concurrent_creates_for_same_user_share_one_instance() {
        let store = Arc::new(WorkingMemoryStore::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.get_or_create("carol").await },
            ));
        }

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        for session in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], session));
        }
        assert_eq!(store.user_count().await, 1);
    }
}
