#![allow(dead_code)]

use async_trait::async_trait;
use chat_relay::config::persona::PersonaConfig;
use chat_relay::history::clock::SystemClock;
use chat_relay::history::memory::{ MemoryHistoryStore, StoreLimits };
use chat_relay::history::HistoryStore;
use chat_relay::llm::chat::{ ChatClient, CompletionRequest, CompletionResponse, TokenStream };
use chat_relay::llm::LlmError;
use chat_relay::relay::{ ConversationRelay, RelayOptions };
use chat_relay::server::api::{ router, AppState };
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_PERSONA: &str = "You are a terse DSA teacher.";

/// What the stub answers to one call.
#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    Fail(String),
    Chunks(Vec<String>),
    ChunksThenFail(Vec<String>, String),
}

/// Scripted model client. Replies are consumed in order; the last one repeats.
pub struct StubChatClient {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    delay: Duration,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StubChatClient {
    pub fn replying(text: impl Into<String>) -> Self {
        Self::scripted(vec![Reply::Text(text.into())])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::scripted(vec![Reply::Fail(message.into())])
    }

    pub fn scripted(replies: Vec<Reply>) -> Self {
        let fallback = replies.last().cloned().unwrap_or(Reply::Text("ok".into()));
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    async fn next_reply(&self, request: &CompletionRequest) -> Reply {
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.replies.lock().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

fn upstream_failure(message: String) -> LlmError {
    LlmError::Status { status: 503, message }
}

#[async_trait]
impl ChatClient for StubChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match self.next_reply(request).await {
            Reply::Text(text) => Ok(CompletionResponse { text }),
            Reply::Chunks(chunks) => Ok(CompletionResponse { text: chunks.concat() }),
            Reply::Fail(message) | Reply::ChunksThenFail(_, message) => Err(upstream_failure(message)),
        }
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TokenStream, LlmError> {
        let items: Vec<Result<String, LlmError>> = match self.next_reply(request).await {
            Reply::Text(text) => vec![Ok(text)],
            Reply::Chunks(chunks) => chunks.into_iter().map(Ok).collect(),
            Reply::Fail(message) => {
                return Err(upstream_failure(message));
            }
            Reply::ChunksThenFail(chunks, message) => {
                let mut items: Vec<_> = chunks.into_iter().map(Ok).collect();
                items.push(Err(upstream_failure(message)));
                items
            }
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn get_model(&self) -> String {
        "stub-model".to_string()
    }
}

pub fn persona() -> Arc<PersonaConfig> {
    Arc::new(PersonaConfig {
        system_instruction: TEST_PERSONA.to_string(),
        greeting: "hi".to_string(),
    })
}

pub fn history(limits: StoreLimits) -> Arc<dyn HistoryStore> {
    Arc::new(MemoryHistoryStore::new(limits, Arc::new(SystemClock)))
}

pub fn relay_with(client: Arc<StubChatClient>) -> Arc<ConversationRelay> {
    relay_with_limits(client, StoreLimits::default())
}

pub fn relay_with_limits(client: Arc<StubChatClient>, limits: StoreLimits) -> Arc<ConversationRelay> {
    Arc::new(ConversationRelay::new(client, history(limits), persona(), RelayOptions::default()))
}

/// Serves the real router on an ephemeral port and returns its base URL.
pub async fn spawn_app(relay: Arc<ConversationRelay>, expose_upstream_errors: bool) -> String {
    let app = router(AppState { relay, expose_upstream_errors });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.expect("serve");
    });
    format!("http://{}", addr)
}
