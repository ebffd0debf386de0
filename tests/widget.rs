//! Chat widget behavior with scripted and real transports.

mod support;

use async_trait::async_trait;
use chat_relay::widget::{
    ChatWidget,
    DisplayRole,
    HttpRelayTransport,
    RelayTransport,
    WidgetError,
    FALLBACK_REPLY,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use support::{ relay_with, spawn_app, StubChatClient };

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    fail_with: Option<String>,
}

#[async_trait]
impl RelayTransport for RecordingTransport {
    async fn send(&self, message: &str, conversation_id: &str) -> Result<String, WidgetError> {
        self.sent.lock().push((message.to_string(), conversation_id.to_string()));
        match &self.fail_with {
            Some(message) => Err(WidgetError::Relay { status: 500, message: message.clone() }),
            None => Ok(format!("echo: {}", message)),
        }
    }
}

fn widget(transport: &Arc<RecordingTransport>) -> ChatWidget<Arc<RecordingTransport>> {
    ChatWidget::with_conversation_id(Arc::clone(transport), "Hello , ask me doubts about DSA", "conv_42".into())
}

#[tokio::test]
async fn starts_with_the_greeting() {
    let transport = Arc::new(RecordingTransport::default());
    let widget = widget(&transport);

    assert_eq!(widget.messages().len(), 1);
    assert_eq!(widget.messages()[0].role, DisplayRole::Assistant);
    assert_eq!(widget.messages()[0].content, "Hello , ask me doubts about DSA");
    assert!(!widget.is_loading());
}

#[tokio::test]
async fn blank_input_sends_nothing() {
    let transport = Arc::new(RecordingTransport::default());
    let mut widget = widget(&transport);

    assert!(!widget.send("").await);
    assert!(!widget.send("   \t").await);

    assert!(transport.sent.lock().is_empty());
    assert_eq!(widget.messages().len(), 1);
    assert_eq!(widget.scroll_generation(), 0);
}

#[tokio::test]
async fn successful_submit_appends_user_and_reply() {
    let transport = Arc::new(RecordingTransport::default());
    let mut widget = widget(&transport);

    assert!(widget.send("What is a queue?").await);

    assert_eq!(
        transport.sent.lock().clone(),
        vec![("What is a queue?".to_string(), "conv_42".to_string())]
    );
    let contents: Vec<(DisplayRole, &str)> = widget
        .messages()
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        contents,
        vec![
            (DisplayRole::Assistant, "Hello , ask me doubts about DSA"),
            (DisplayRole::User, "What is a queue?"),
            (DisplayRole::Assistant, "echo: What is a queue?")
        ]
    );
    assert_eq!(widget.input(), "");
    assert!(!widget.is_loading());
    assert!(widget.error().is_none());
    assert_eq!(widget.scroll_generation(), 2);
}

#[tokio::test]
async fn failure_shows_apology_and_keeps_error_text() {
    let transport = Arc::new(RecordingTransport {
        fail_with: Some("model provider returned 503: overloaded".into()),
        ..RecordingTransport::default()
    });
    let mut widget = widget(&transport);

    assert!(widget.send("hi").await);

    let last = widget.messages().last().expect("message");
    assert_eq!(last.role, DisplayRole::Assistant);
    assert_eq!(last.content, FALLBACK_REPLY);
    assert_eq!(widget.error(), Some("model provider returned 503: overloaded"));
    assert!(!widget.is_loading());
}

#[tokio::test]
async fn only_one_submission_in_flight() {
    let transport = Arc::new(RecordingTransport::default());
    let mut widget = widget(&transport);

    widget.set_input("first");
    let pending = widget.begin_submit().expect("accepted");
    assert_eq!(pending.message, "first");
    assert!(widget.is_loading());

    widget.set_input("second");
    assert!(widget.begin_submit().is_none());
    assert!(!widget.submit().await);
    assert!(transport.sent.lock().is_empty());

    widget.finish_submit(Ok("done".into()));
    assert!(!widget.is_loading());
    assert_eq!(widget.input(), "second");
    assert!(widget.submit().await);
}

#[tokio::test]
async fn http_transport_talks_to_the_relay() {
    let base = spawn_app(relay_with(Arc::new(StubChatClient::replying("chamka! A stack is LIFO."))), true).await;
    let mut widget = ChatWidget::new(HttpRelayTransport::new(&base), "hi");
    assert!(widget.conversation_id().starts_with("conv_"));

    assert!(widget.send("What is a stack?").await);

    assert_eq!(widget.messages().last().expect("reply").content, "chamka! A stack is LIFO.");
    assert!(widget.error().is_none());
}

#[tokio::test]
async fn http_transport_surfaces_relay_error_field() {
    let base = spawn_app(relay_with(Arc::new(StubChatClient::failing("quota exceeded"))), true).await;
    let mut widget = ChatWidget::new(HttpRelayTransport::new(&base), "hi");

    assert!(widget.send("hello").await);

    assert_eq!(widget.error(), Some("model provider returned 503: quota exceeded"));
    assert_eq!(widget.messages().last().expect("reply").content, FALLBACK_REPLY);
}

#[tokio::test]
async fn http_transport_reports_unreachable_relay() {
    let mut widget = ChatWidget::new(HttpRelayTransport::new("http://127.0.0.1:1"), "hi");

    assert!(widget.send("hello").await);

    assert!(widget.error().is_some());
    assert_eq!(widget.messages().last().expect("reply").content, FALLBACK_REPLY);
}
