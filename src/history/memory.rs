use async_trait::async_trait;
use chrono::{ DateTime, Duration, Utc };
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::clock::Clock;
use super::{ HistoryError, HistoryStore };
use crate::models::chat::{ ConversationId, Transcript, Turn };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Idle time after which a conversation is dropped. `None` keeps it forever.
    pub ttl: Option<Duration>,
    /// Upper bound on stored conversations. `None` is unbounded.
    pub max_conversations: Option<usize>,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::hours(1)),
            max_conversations: Some(10_000),
        }
    }
}

struct Entry {
    turns: Vec<Turn>,
    last_active: DateTime<Utc>,
}

pub struct MemoryHistoryStore {
    entries: Mutex<HashMap<ConversationId, Entry>>,
    limits: StoreLimits,
    clock: Arc<dyn Clock>,
}

impl MemoryHistoryStore {
    pub fn new(limits: StoreLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            limits,
            clock,
        }
    }

    fn purge_expired(&self, entries: &mut HashMap<ConversationId, Entry>, now: DateTime<Utc>) {
        let Some(ttl) = self.limits.ttl else {
            return;
        };
        entries.retain(|id, entry| {
            let keep = now - entry.last_active < ttl;
            if !keep {
                debug!("Evicting idle conversation {}", id);
            }
            keep
        });
    }

    fn make_room(&self, entries: &mut HashMap<ConversationId, Entry>) {
        let Some(max) = self.limits.max_conversations else {
            return;
        };
        while !entries.is_empty() && entries.len() >= max {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_active)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    debug!("Store full ({} conversations), evicting {}", max, id);
                    entries.remove(&id);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append_turn(&self, conversation_id: &ConversationId, turn: Turn) -> Result<(), HistoryError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.purge_expired(&mut entries, now);

        if !entries.contains_key(conversation_id) {
            self.make_room(&mut entries);
        }
        let entry = entries.entry(conversation_id.clone()).or_insert_with(|| Entry {
            turns: Vec::new(),
            last_active: now,
        });
        entry.turns.push(turn);
        entry.last_active = now;
        Ok(())
    }

    async fn append_reply(&self, conversation_id: &ConversationId, turn: Turn) -> Result<(), HistoryError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.purge_expired(&mut entries, now);

        match entries.get_mut(conversation_id) {
            Some(entry) => {
                entry.turns.push(turn);
                entry.last_active = now;
                Ok(())
            }
            None => {
                debug!("Dropping reply for evicted conversation {}", conversation_id);
                Err(HistoryError::Evicted(conversation_id.clone()))
            }
        }
    }

    async fn get_transcript(&self, conversation_id: &ConversationId) -> Result<Transcript, HistoryError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.purge_expired(&mut entries, now);

        let turns = match entries.get_mut(conversation_id) {
            Some(entry) => {
                entry.last_active = now;
                entry.turns.clone()
            }
            None => Vec::new(),
        };
        Ok(Transcript { conversation_id: conversation_id.clone(), turns })
    }

    async fn remove_conversation(&self, conversation_id: &ConversationId) -> Result<bool, HistoryError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        self.purge_expired(&mut entries, now);
        Ok(entries.remove(conversation_id).is_some())
    }
}
