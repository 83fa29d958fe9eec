//! Per-conversation serialization.

use std::sync::Arc;

use chat_checkout_core::ConversationId;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<ConversationId, Arc<Mutex<()>>>;

/// One async mutex per conversation.
///
/// Chat messages and the payment webhook for the same buyer take the same
/// lock, so a session is never read and written by two tasks at once.
/// An entry lives exactly as long as someone holds or waits on it.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    locks: Arc<LockMap>,
}

impl ConversationLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a conversation.
    pub async fn acquire(&self, id: &ConversationId) -> ConversationGuard {
        let lock = self
            .locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        ConversationGuard {
            guard: Some(lock.lock_owned().await),
            id: id.clone(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Conversations currently holding or waiting on a lock.
    #[must_use]
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive access to one conversation, released on drop.
pub struct ConversationGuard {
    guard: Option<OwnedMutexGuard<()>>,
    id: ConversationId,
    locks: Arc<LockMap>,
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: nobody holds or waits.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
