use serde::{ Serialize, Deserialize };
use std::fmt;
use thiserror::Error;

pub const MAX_CONVERSATION_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("conversationId is required")]
    MissingConversationId,
    #[error("conversationId must be at most {max} characters")]
    ConversationIdTooLong { max: usize },
    #[error("conversationId contains invalid character '{0}'")]
    InvalidConversationIdChar(char),
    #[error("malformed JSON body: {0}")]
    MalformedBody(String),
    #[error("message is required")]
    MissingMessage,
    #[error("message must not be blank")]
    BlankMessage,
    #[error("message must be at most {max} characters (got {actual})")]
    MessageTooLong { max: usize, actual: usize },
}

/// Client-chosen key grouping turns into one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::MissingConversationId);
        }
        if raw.chars().count() > MAX_CONVERSATION_ID_LEN {
            return Err(ValidationError::ConversationIdTooLong { max: MAX_CONVERSATION_ID_LEN });
        }
        if let Some(bad) = raw.chars().find(|c| !is_id_char(*c)) {
            return Err(ValidationError::InvalidConversationIdChar(bad));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConversationId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConversationId> for String {
    fn from(id: ConversationId) -> Self {
        id.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub conversation_id: ConversationId,
    pub turns: Vec<Turn>,
}

impl Transcript {
    pub fn empty(conversation_id: ConversationId) -> Self {
        Self { conversation_id, turns: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_widget_generated_ids() {
        let id = ConversationId::parse("conv_1718000000000").expect("valid id");
        assert_eq!(id.as_str(), "conv_1718000000000");
    }

    #[test]
    fn rejects_empty_and_oversized_ids() {
        assert_eq!(ConversationId::parse(""), Err(ValidationError::MissingConversationId));
        let long = "a".repeat(MAX_CONVERSATION_ID_LEN + 1);
        assert_eq!(
            ConversationId::parse(&long),
            Err(ValidationError::ConversationIdTooLong { max: MAX_CONVERSATION_ID_LEN })
        );
    }

    #[test]
    fn rejects_ids_with_path_or_space_characters() {
        assert_eq!(
            ConversationId::parse("conv 1"),
            Err(ValidationError::InvalidConversationIdChar(' '))
        );
        assert_eq!(
            ConversationId::parse("../etc"),
            Err(ValidationError::InvalidConversationIdChar('/'))
        );
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::model("hi")).expect("serialize");
        assert_eq!(json, r#"{"role":"model","text":"hi"}"#);
        let bad = serde_json::from_str::<Turn>(r#"{"role":"system","text":"x"}"#);
        assert!(bad.is_err());
    }
}
