//! Client-side chat widget state.
//!
//! The widget owns the rendered message list and talks to the relay through
//! a [`RelayTransport`]. It allows one request in flight at a time; that
//! guard is local to one widget instance.

pub mod terminal;
pub mod transport;

use chrono::{ DateTime, Local };
use log::{ debug, warn };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

pub use self::transport::{ HttpRelayTransport, RelayTransport, WidgetError };

pub const FALLBACK_REPLY: &str = "Sorry , I could not process your request .Please try again";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub id: String,
    pub content: String,
    pub role: DisplayRole,
    pub timestamp: DateTime<Local>,
}

impl DisplayMessage {
    fn new(role: DisplayRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            timestamp: Local::now(),
        }
    }

    pub fn formatted_time(&self) -> String {
        self.timestamp.format("%I:%M %p").to_string()
    }
}

/// A submission accepted by [`ChatWidget::begin_submit`], to be sent to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    pub message: String,
    pub conversation_id: String,
}

pub struct ChatWidget<T: RelayTransport> {
    transport: T,
    conversation_id: String,
    messages: Vec<DisplayMessage>,
    input: String,
    is_loading: bool,
    error: Option<String>,
    scroll_generation: u64,
}

pub fn new_conversation_id() -> String {
    format!("conv_{}", Local::now().timestamp_millis())
}

impl<T: RelayTransport> ChatWidget<T> {
    pub fn new(transport: T, greeting: &str) -> Self {
        Self::with_conversation_id(transport, greeting, new_conversation_id())
    }

    pub fn with_conversation_id(transport: T, greeting: &str, conversation_id: String) -> Self {
        Self {
            transport,
            conversation_id,
            messages: vec![DisplayMessage::new(DisplayRole::Assistant, greeting)],
            input: String::new(),
            is_loading: false,
            error: None,
            scroll_generation: 0,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Bumped on every change to the message list; renderers scroll to the
    /// latest message when it moves.
    pub fn scroll_generation(&self) -> u64 {
        self.scroll_generation
    }

    fn push_message(&mut self, message: DisplayMessage) {
        self.messages.push(message);
        self.scroll_generation += 1;
    }

    /// Accepts the current input if it is not blank and nothing is in flight.
    /// On acceptance the user's message is shown, the input cleared and the
    /// widget marked as loading.
    pub fn begin_submit(&mut self) -> Option<PendingSubmission> {
        if self.input.trim().is_empty() || self.is_loading {
            debug!("Ignoring submit (blank input or request in flight)");
            return None;
        }
        let message = std::mem::take(&mut self.input);
        self.push_message(DisplayMessage::new(DisplayRole::User, message.clone()));
        self.is_loading = true;
        self.error = None;

        Some(PendingSubmission {
            message,
            conversation_id: self.conversation_id.clone(),
        })
    }

    /// Records the relay's answer, or the fallback apology on failure.
    pub fn finish_submit(&mut self, outcome: Result<String, WidgetError>) {
        match outcome {
            Ok(reply) => {
                self.push_message(DisplayMessage::new(DisplayRole::Assistant, reply));
            }
            Err(e) => {
                warn!("chat error : {}", e);
                self.error = Some(e.to_string());
                self.push_message(DisplayMessage::new(DisplayRole::Assistant, FALLBACK_REPLY));
            }
        }
        self.is_loading = false;
    }

    /// Submits the current input. Returns `false` when nothing was sent.
    pub async fn submit(&mut self) -> bool {
        let Some(pending) = self.begin_submit() else {
            return false;
        };
        let outcome = self.transport.send(&pending.message, &pending.conversation_id).await;
        self.finish_submit(outcome);
        true
    }

    pub async fn send(&mut self, text: impl Into<String>) -> bool {
        self.set_input(text);
        self.submit().await
    }
}
