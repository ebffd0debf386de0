pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Gemini,
    OpenAI,
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::Gemini => write!(f, "gemini"),
            LlmType::OpenAI => write!(f, "openai"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Error)]
#[error("Invalid LLM type: '{0}'")]
pub struct ParseLlmTypeError(String);

impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmType::Gemini),
            "openai" => Ok(LlmType::OpenAI),
            _ => Err(ParseLlmTypeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::Gemini,
            api_key: None,
            completion_model: None,
            base_url: None,
            timeout: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to model provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model provider returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("model provider returned no text")]
    EmptyResponse,
    #[error("invalid model client configuration: {0}")]
    Config(String),
    #[error("malformed stream from model provider: {0}")]
    Stream(String),
}

/// Extracts the provider's error text from a failed response body.
/// Both Gemini and OpenAI wrap it as `{"error": {"message": ...}}`.
pub(crate) fn provider_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty error body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_provider_names_case_insensitively() {
        assert_eq!("Gemini".parse::<LlmType>(), Ok(LlmType::Gemini));
        assert_eq!(" openai ".parse::<LlmType>(), Ok(LlmType::OpenAI));
        assert!("ollama".parse::<LlmType>().is_err());
    }

    #[test]
    fn extracts_wrapped_provider_messages() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(provider_error_message(body), "API key not valid");
        assert_eq!(provider_error_message("upstream down\n"), "upstream down");
        assert_eq!(provider_error_message(""), "empty error body");
    }
}
