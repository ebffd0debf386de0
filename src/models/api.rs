use serde::{ Serialize, Deserialize };

use super::chat::{ ConversationId, ValidationError };

/// Body of `POST /api/chat`. Fields are optional so that a missing field
/// surfaces as a validation error instead of a generic JSON rejection.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedChat {
    pub conversation_id: ConversationId,
    pub message: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            conversation_id: Some(conversation_id.into()),
        }
    }

    pub fn validate(self, max_message_chars: usize) -> Result<ValidatedChat, ValidationError> {
        let conversation_id = ConversationId::parse(
            self.conversation_id.as_deref().unwrap_or_default()
        )?;
        let message = self.message.ok_or(ValidationError::MissingMessage)?;
        validate_message(&message, max_message_chars)?;
        Ok(ValidatedChat { conversation_id, message })
    }
}

pub fn validate_message(message: &str, max_chars: usize) -> Result<(), ValidationError> {
    if message.trim().is_empty() {
        return Err(ValidationError::BlankMessage);
    }
    let actual = message.chars().count();
    if actual > max_chars {
        return Err(ValidationError::MessageTooLong { max: max_chars, actual });
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChunkPayload {
    pub text: String,
}
