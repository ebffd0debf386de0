use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use thiserror::Error;

use crate::models::api::{ ChatRequest, ChatResponse, ErrorResponse };

pub const DEFAULT_FAILURE_MESSAGE: &str = "Failed to get response";

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// The relay answered with a non-success status; the text is its `error` field.
    #[error("{message}")]
    Relay { status: u16, message: String },
}

#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send(&self, message: &str, conversation_id: &str) -> Result<String, WidgetError>;
}

#[async_trait]
impl<T: RelayTransport + ?Sized> RelayTransport for Arc<T> {
    async fn send(&self, message: &str, conversation_id: &str) -> Result<String, WidgetError> {
        (**self).send(message, conversation_id).await
    }
}

pub struct HttpRelayTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpRelayTransport {
    pub fn new(relay_url: &str) -> Self {
        Self::with_client(relay_url, reqwest::Client::new())
    }

    pub fn with_client(relay_url: &str, http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: format!("{}/api/chat", relay_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn send(&self, message: &str, conversation_id: &str) -> Result<String, WidgetError> {
        debug!("POST {} (conversation {})", self.endpoint, conversation_id);
        let resp = self.http
            .post(&self.endpoint)
            .json(&ChatRequest::new(message, conversation_id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorResponse>().await
                .ok()
                .map(|body| body.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
            return Err(WidgetError::Relay { status: status.as_u16(), message });
        }

        let body: ChatResponse = resp.json().await?;
        Ok(body.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_derived_from_relay_url() {
        assert_eq!(HttpRelayTransport::new("http://localhost:3000/").endpoint(), "http://localhost:3000/api/chat");
    }

    #[test]
    fn relay_errors_display_only_the_message() {
        let err = WidgetError::Relay { status: 500, message: "quota exceeded".into() };
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
