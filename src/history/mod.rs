pub mod clock;
pub mod memory;

use async_trait::async_trait;
use chrono::Duration;
use log::info;
use std::sync::Arc;
use thiserror::Error;

use crate::models::chat::{ ConversationId, Transcript, Turn };
use self::clock::SystemClock;
use self::memory::{ MemoryHistoryStore, StoreLimits };

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history backend unavailable: {0}")]
    Unavailable(String),
    #[error("conversation {0} was evicted before the reply arrived")]
    Evicted(ConversationId),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_turn(
        &self,
        conversation_id: &ConversationId,
        turn: Turn
    ) -> Result<(), HistoryError>;

    /// Appends to a conversation that is still stored. Fails with
    /// `HistoryError::Evicted` instead of starting a new transcript.
    async fn append_reply(
        &self,
        conversation_id: &ConversationId,
        turn: Turn
    ) -> Result<(), HistoryError>;

    /// Returns the stored turns in order. Unknown ids yield an empty transcript.
    async fn get_transcript(
        &self,
        conversation_id: &ConversationId
    ) -> Result<Transcript, HistoryError>;

    async fn remove_conversation(&self, conversation_id: &ConversationId) -> Result<bool, HistoryError>;
}

const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Builds store limits from the numeric settings, where `0` means "no limit".
pub fn store_limits(ttl_secs: u64, max_conversations: usize) -> StoreLimits {
    StoreLimits {
        ttl: (ttl_secs > 0).then(|| Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64)),
        max_conversations: (max_conversations > 0).then_some(max_conversations),
    }
}

pub fn initialize_history_store(limits: StoreLimits) -> Arc<dyn HistoryStore> {
    info!(
        "Chat history kept in memory: ttl={} max_conversations={}",
        limits.ttl.map(|t| format!("{}s", t.num_seconds())).unwrap_or_else(|| "none".into()),
        limits.max_conversations.map(|m| m.to_string()).unwrap_or_else(|| "unbounded".into())
    );
    Arc::new(MemoryHistoryStore::new(limits, Arc::new(SystemClock)))
}
