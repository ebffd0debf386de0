use async_trait::async_trait;
use log::info;
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
use crate::models::chat::{ Role, Turn };

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

impl GoogleResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

fn parse_gemini_event(data: &str) -> Result<Option<String>, LlmError> {
    let chunk = serde_json
        ::from_str::<GoogleResponse>(data)
        .map_err(|e| LlmError::Stream(e.to_string()))?;
    Ok(Some(chunk.text()))
}

fn to_gemini_request(request: &CompletionRequest) -> GeminiRequest {
    let contents = request.turns
        .iter()
        .map(|turn: &Turn| GeminiContent {
            role: match turn.role {
                Role::User => "user",
                Role::Model => "model",
            },
            parts: vec![GeminiPart { text: turn.text.clone() }],
        })
        .collect();

    let system_instruction = request.system_instruction
        .as_ref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| GeminiSystemInstruction {
            parts: vec![GeminiPart { text: s.clone() }],
        });

    GeminiRequest { contents, system_instruction }
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        http: reqwest::Client
    ) -> Self {
        let chat_model = model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        Self {
            http,
            api_key,
            model: chat_model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::Config("Google API key is required for GeminiChatClient".to_string()))?;
        let http = build_http_client(config.timeout)?;

        Ok(Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), http))
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        info!(
            "GeminiChatClient::complete() → model={} turns={}",
            self.model,
            request.turns.len()
        );
        let resp = self.http
            .post(self.endpoint("generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&to_gemini_request(request))
            .send()
            .await?;

        let body: GoogleResponse = ensure_success(resp).await?.json().await?;
        let text = body.text();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(CompletionResponse { text })
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        info!(
            "GeminiChatClient::complete_stream() → model={} turns={}",
            self.model,
            request.turns.len()
        );
        let req = self.http
            .post(format!("{}?alt=sse", self.endpoint("streamGenerateContent")))
            .header("x-goog-api-key", &self.api_key)
            .json(&to_gemini_request(request));

        http_sse_stream(req, parse_gemini_event).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn supports_native_streaming(&self) -> bool {
        true
    }
}
