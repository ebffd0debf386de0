use async_trait::async_trait;
use log::info;
use reqwest::header::AUTHORIZATION;
use serde::{ Deserialize, Serialize };

use super::{
    build_http_client,
    ensure_success,
    http_sse_stream,
    ChatClient,
    CompletionRequest,
    CompletionResponse,
    TokenStream,
};
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::Role;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

fn parse_openai_event(data: &str) -> Result<Option<String>, LlmError> {
    let event = serde_json
        ::from_str::<OpenAIStreamResponse>(data)
        .map_err(|e| LlmError::Stream(e.to_string()))?;
    Ok(
        Some(
            event.choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect()
        )
    )
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        http: reqwest::Client
    ) -> Self {
        let chat_model = model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let api_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        Self {
            http,
            api_key,
            model: chat_model,
            base_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::Config("OpenAI API key is required".to_string()))?;
        let http = build_http_client(config.timeout)?;

        Ok(Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), http))
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> OpenAIChatRequest {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if let Some(system) = request.system_instruction.as_ref().filter(|s| !s.trim().is_empty()) {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        for turn in &request.turns {
            let role = match turn.role {
                Role::User => "user",
                Role::Model => "assistant",
            };
            messages.push(OpenAIMessage {
                role: role.to_string(),
                content: turn.text.clone(),
            });
        }

        OpenAIChatRequest {
            model: self.model.clone(),
            messages,
            stream: stream.then_some(true),
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        info!(
            "OpenAIChatClient::complete() → model={} turns={}",
            self.model,
            request.turns.len()
        );
        let resp = self.http
            .post(self.url())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&self.build_request(request, false))
            .send()
            .await?;

        let body: OpenAIResponse = ensure_success(resp).await?.json().await?;
        let text = body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        Ok(CompletionResponse { text })
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        info!(
            "OpenAIChatClient::complete_stream() → model={} turns={}",
            self.model,
            request.turns.len()
        );
        let req = self.http
            .post(self.url())
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&self.build_request(request, true));

        http_sse_stream(req, parse_openai_event).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn supports_native_streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Turn;
    use pretty_assertions::assert_eq;

    fn client() -> OpenAIChatClient {
        OpenAIChatClient::new("sk-test".into(), None, Some("http://localhost:1/v1/".into()), reqwest::Client::new())
    }

    #[test]
    fn system_message_leads_and_model_turns_become_assistant() {
        let request = CompletionRequest {
            system_instruction: Some("persona".into()),
            turns: vec![Turn::user("a"), Turn::model("b")],
        };
        let json = serde_json::to_value(client().build_request(&request, false)).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "model": DEFAULT_OPENAI_MODEL,
                "messages": [
                    {"role": "system", "content": "persona"},
                    {"role": "user", "content": "a"},
                    {"role": "assistant", "content": "b"}
                ]
            })
        );
        assert_eq!(client().url(), "http://localhost:1/v1/chat/completions");
    }

    #[test]
    fn stream_deltas_are_concatenated() {
        let data = r#"{"choices":[{"delta":{"content":"LI"},"finish_reason":null}]}"#;
        assert_eq!(parse_openai_event(data).expect("parse"), Some("LI".to_string()));
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_openai_event(role_only).expect("parse"), Some(String::new()));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let config = LlmConfig {
            llm_type: crate::llm::LlmType::OpenAI,
            api_key: Some("  ".into()),
            ..LlmConfig::default()
        };
        assert!(matches!(OpenAIChatClient::from_config(&config), Err(LlmError::Config(_))));
    }
}
