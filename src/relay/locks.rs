use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{ Mutex as AsyncMutex, OwnedMutexGuard };

use crate::models::chat::ConversationId;

type LockMap = HashMap<ConversationId, Arc<AsyncMutex<()>>>;

/// One async mutex per active conversation. Entries are dropped again once
/// nobody holds or waits on them.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    inner: Arc<Mutex<LockMap>>,
}

pub struct ConversationGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<Mutex<LockMap>>,
    conversation_id: ConversationId,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, conversation_id: &ConversationId) -> ConversationGuard {
        let lock = {
            let mut map = self.inner.lock();
            map.entry(conversation_id.clone()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        ConversationGuard {
            guard: Some(guard),
            locks: Arc::clone(&self.inner),
            conversation_id: conversation_id.clone(),
        }
    }

    pub fn active(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.lock();
        let unused = map
            .get(&self.conversation_id)
            .map(|lock| Arc::strong_count(lock) == 1)
            .unwrap_or(false);
        if unused {
            map.remove(&self.conversation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(raw: &str) -> ConversationId {
        ConversationId::parse(raw).expect("valid id")
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = ConversationLocks::new();
        {
            let _a = locks.acquire(&id("a")).await;
            let _b = locks.acquire(&id("b")).await;
            assert_eq!(locks.active(), 2);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn same_conversation_is_serialized() {
        let locks = ConversationLocks::new();
        let first = locks.acquire(&id("a")).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id("a")).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.expect("join");
        assert_eq!(locks.active(), 0);
    }
}
