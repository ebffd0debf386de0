pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::debug;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ provider_error_message, LlmConfig, LlmError, LlmType };
use crate::models::chat::Turn;
use self::gemini::GeminiChatClient;
use self::openai::OpenAIChatClient;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Everything the provider needs for one completion. The model name is part
/// of the client's configuration, not of the request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system_instruction: Option<String>,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub text: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Streams the reply in chunks. Providers without native streaming yield
    /// the whole reply as a single chunk.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        let response = self.complete(request).await?;
        Ok(full_response_as_stream(response.text))
    }

    fn get_model(&self) -> String;

    fn supports_native_streaming(&self) -> bool {
        false
    }
}

pub fn full_response_as_stream(text: String) -> TokenStream {
    Box::pin(futures::stream::once(async move { Ok(text) }))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

pub(crate) fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, LlmError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(LlmError::from)
}

/// Turns a non-success response into `LlmError::Status` carrying the
/// provider's own message.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(LlmError::Status {
        status: status.as_u16(),
        message: provider_error_message(&body),
    })
}

/// Sends `request` and relays the text extracted from each SSE `data:` line.
/// `data_parser` returns `Ok(None)` for events that carry no text.
pub(crate) async fn http_sse_stream(
    request: reqwest::RequestBuilder,
    data_parser: fn(&str) -> Result<Option<String>, LlmError>
) -> Result<TokenStream, LlmError> {
    let resp = ensure_success(request.send().await?).await?;
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut bytes = resp.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    pending.extend_from_slice(&buf);
                    while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = pending.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        match parse_sse_line(&line, data_parser) {
                            SseLine::Skip => {}
                            SseLine::Done => {
                                return;
                            }
                            SseLine::Item(item) => {
                                if tx.send(item).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(LlmError::from(e))).await;
                    return;
                }
            }
        }

        let rest = String::from_utf8_lossy(&pending).to_string();
        if let SseLine::Item(item) = parse_sse_line(&rest, data_parser) {
            let _ = tx.send(item).await;
        }
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

enum SseLine {
    Skip,
    Done,
    Item(Result<String, LlmError>),
}

fn parse_sse_line(line: &str, data_parser: fn(&str) -> Result<Option<String>, LlmError>) -> SseLine {
    let line = line.trim();
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim_start(),
        None => {
            return SseLine::Skip;
        }
    };
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match data_parser(data) {
        Ok(Some(text)) if !text.is_empty() => SseLine::Item(Ok(text)),
        Ok(_) => SseLine::Skip,
        Err(e) => {
            debug!("Unparseable stream event: {}", data);
            SseLine::Item(Err(e))
        }
    }
}
