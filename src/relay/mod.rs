//! Conversation relay: keeps one transcript per conversation id and forwards
//! it, together with the persona instruction, to the configured model.
//!
//! Every exchange for a given conversation runs under that conversation's
//! lock, so the user turn, the model call and the model turn form one atomic
//! step. Different conversations proceed in parallel.

pub mod locks;

use futures::StreamExt;
use log::{ debug, error, info };
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::persona::PersonaConfig;
use crate::history::{ HistoryError, HistoryStore };
use crate::llm::chat::{ ChatClient, CompletionRequest };
use crate::llm::LlmError;
use crate::models::api::{ validate_message, ChatRequest };
use crate::models::chat::{ ConversationId, Transcript, Turn, ValidationError };
use self::locks::ConversationLocks;

pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 8000;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] LlmError),
    #[error(transparent)]
    History(#[from] HistoryError),
}

impl RelayError {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::InvalidRequest(_) => "InvalidRequest",
            RelayError::Upstream(_) => "UpstreamFailure",
            RelayError::History(_) => "HistoryFailure",
        }
    }

    /// The error's string form including every underlying cause.
    pub fn details(&self) -> String {
        let mut details = format!("{}: {}", self.kind(), self);
        let mut source = self.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !details.ends_with(&text) {
                details.push_str(": ");
                details.push_str(&text);
            }
            source = cause.source();
        }
        details
    }
}

#[derive(Debug)]
pub enum RelayEvent {
    Chunk(String),
    Done(String),
    Failed(RelayError),
}

#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    pub max_message_chars: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self { max_message_chars: DEFAULT_MAX_MESSAGE_CHARS }
    }
}

pub struct ConversationRelay {
    chat_client: Arc<dyn ChatClient>,
    history: Arc<dyn HistoryStore>,
    persona: Arc<PersonaConfig>,
    locks: ConversationLocks,
    options: RelayOptions,
}

impl ConversationRelay {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        history: Arc<dyn HistoryStore>,
        persona: Arc<PersonaConfig>,
        options: RelayOptions
    ) -> Self {
        Self {
            chat_client,
            history,
            persona,
            locks: ConversationLocks::new(),
            options,
        }
    }

    pub fn options(&self) -> RelayOptions {
        self.options
    }

    /// Validates a raw request body and relays it.
    pub async fn handle_request(&self, request: ChatRequest) -> Result<String, RelayError> {
        let chat = request.validate(self.options.max_message_chars)?;
        self.handle(&chat.conversation_id, &chat.message).await
    }

    /// Appends the user's message, asks the model for a reply over the whole
    /// transcript, and records the reply. A failed model call leaves the user
    /// turn in place and records no model turn. If the store evicted the
    /// conversation while the model was answering, the reply is dropped and
    /// `HistoryError::Evicted` is returned.
    pub async fn handle(&self, conversation_id: &ConversationId, message: &str) -> Result<String, RelayError> {
        validate_message(message, self.options.max_message_chars)?;
        let _guard = self.locks.acquire(conversation_id).await;

        let request = self.record_user_turn(conversation_id, message).await?;
        match self.chat_client.complete(&request).await {
            Ok(response) => {
                self.history.append_reply(conversation_id, Turn::model(response.text.clone())).await?;
                info!(
                    "Relayed reply for {} ({} turns, model={})",
                    conversation_id,
                    request.turns.len() + 1,
                    self.chat_client.get_model()
                );
                Ok(response.text)
            }
            Err(e) => {
                error!("Model call failed for {}: {}", conversation_id, e);
                Err(RelayError::Upstream(e))
            }
        }
    }

    /// Streaming variant of [`handle`](Self::handle). The conversation stays
    /// locked until the stream has finished; the model turn is recorded only
    /// if the upstream stream completes with some text.
    pub async fn handle_stream(
        self: &Arc<Self>,
        conversation_id: ConversationId,
        message: String
    ) -> Result<ReceiverStream<RelayEvent>, RelayError> {
        validate_message(&message, self.options.max_message_chars)?;
        let (tx, rx) = mpsc::channel(32);
        let relay = Arc::clone(self);

        tokio::spawn(async move {
            let event = match relay.stream_exchange(&conversation_id, &message, &tx).await {
                Ok(reply) => RelayEvent::Done(reply),
                Err(e) => {
                    error!("Streaming exchange failed for {}: {}", conversation_id, e);
                    RelayEvent::Failed(e)
                }
            };
            if tx.send(event).await.is_err() {
                debug!("Stream consumer for {} went away before completion", conversation_id);
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    async fn stream_exchange(
        &self,
        conversation_id: &ConversationId,
        message: &str,
        tx: &mpsc::Sender<RelayEvent>
    ) -> Result<String, RelayError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let request = self.record_user_turn(conversation_id, message).await?;

        let mut chunks = self.chat_client.complete_stream(&request).await?;
        let mut reply = String::new();
        while let Some(chunk) = chunks.next().await {
            let text = chunk?;
            reply.push_str(&text);
            // A vanished consumer does not cancel the exchange; the reply is still recorded.
            let _ = tx.send(RelayEvent::Chunk(text)).await;
        }
        if reply.is_empty() {
            return Err(RelayError::Upstream(LlmError::EmptyResponse));
        }

        self.history.append_reply(conversation_id, Turn::model(reply.clone())).await?;
        info!("Relayed streamed reply for {} ({} turns)", conversation_id, request.turns.len() + 1);
        Ok(reply)
    }

    async fn record_user_turn(
        &self,
        conversation_id: &ConversationId,
        message: &str
    ) -> Result<CompletionRequest, RelayError> {
        self.history.append_turn(conversation_id, Turn::user(message)).await?;
        let transcript = self.history.get_transcript(conversation_id).await?;
        Ok(CompletionRequest {
            system_instruction: Some(self.persona.system_instruction.clone()),
            turns: transcript.turns,
        })
    }

    pub async fn transcript(&self, conversation_id: &ConversationId) -> Result<Transcript, RelayError> {
        Ok(self.history.get_transcript(conversation_id).await?)
    }

    /// Drops a conversation, waiting for any exchange in progress on it.
    pub async fn reset(&self, conversation_id: &ConversationId) -> Result<bool, RelayError> {
        let _guard = self.locks.acquire(conversation_id).await;
        let removed = self.history.remove_conversation(conversation_id).await?;
        if removed {
            info!("Conversation {} removed", conversation_id);
        }
        Ok(removed)
    }
}
