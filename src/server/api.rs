use crate::models::api::{ ChatRequest, ChatResponse, ChunkPayload, ErrorResponse };
use crate::models::chat::{ ConversationId, ValidationError };
use crate::relay::{ ConversationRelay, RelayError, RelayEvent };
use std::convert::Infallible;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ Path, State, rejection::JsonRejection },
    response::{ IntoResponse, Response, sse::{ Event, KeepAlive, Sse } },
    http::StatusCode,
};
use futures::StreamExt;
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ error, warn };

const GENERIC_UPSTREAM_ERROR: &str = "Failed to get AI response";
const GENERIC_UPSTREAM_DETAILS: &str = "The model provider request failed";

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ConversationRelay>,
    /// Whether upstream error text is forwarded to clients verbatim.
    pub expose_upstream_errors: bool,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .route("/api/chat/{conversation_id}", get(transcript_handler).delete(reset_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

struct ApiError {
    error: RelayError,
    expose_upstream_errors: bool,
}

impl ApiError {
    fn new(error: RelayError, state: &AppState) -> Self {
        Self { error, expose_upstream_errors: state.expose_upstream_errors }
    }

    fn status(&self) -> StatusCode {
        match self.error {
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) | RelayError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        error_body(&self.error, self.expose_upstream_errors)
    }
}

fn error_body(err: &RelayError, expose_upstream_errors: bool) -> ErrorResponse {
    match err {
        RelayError::InvalidRequest(_) =>
            ErrorResponse {
                error: err.to_string(),
                details: err.details(),
            },
        _ if expose_upstream_errors =>
            ErrorResponse {
                error: err.to_string(),
                details: err.details(),
            },
        _ =>
            ErrorResponse {
                error: GENERIC_UPSTREAM_ERROR.to_string(),
                details: GENERIC_UPSTREAM_DETAILS.to_string(),
            },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

fn parse_body(
    payload: Result<Json<ChatRequest>, JsonRejection>,
    state: &AppState
) -> Result<ChatRequest, ApiError> {
    payload.map(|Json(req)| req).map_err(|rejection| {
        warn!("Rejected chat body: {}", rejection.body_text());
        let err = ValidationError::MalformedBody(rejection.body_text());
        ApiError::new(err.into(), state)
    })
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Json<ChatResponse>, ApiError> {
    let request = parse_body(payload, &state)?;
    match state.relay.handle_request(request).await {
        Ok(message) => Ok(Json(ChatResponse { message })),
        Err(e) => {
            error!("Error in chat route: {}", e.details());
            Err(ApiError::new(e, &state))
        }
    }
}

async fn chat_stream_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Response, ApiError> {
    let request = parse_body(payload, &state)?;
    let chat = request
        .validate(state.relay.options().max_message_chars)
        .map_err(|e| ApiError::new(e.into(), &state))?;
    let events = state.relay
        .handle_stream(chat.conversation_id, chat.message).await
        .map_err(|e| ApiError::new(e, &state))?;

    let expose = state.expose_upstream_errors;
    let sse_events = events.map(move |event| Ok::<Event, Infallible>(to_sse_event(event, expose)));
    Ok(Sse::new(sse_events).keep_alive(KeepAlive::default()).into_response())
}

fn to_sse_event(event: RelayEvent, expose_upstream_errors: bool) -> Event {
    let (name, data) = match event {
        RelayEvent::Chunk(text) => ("chunk", serde_json::to_string(&ChunkPayload { text })),
        RelayEvent::Done(message) => ("done", serde_json::to_string(&ChatResponse { message })),
        RelayEvent::Failed(e) => ("error", serde_json::to_string(&error_body(&e, expose_upstream_errors))),
    };
    Event::default()
        .event(name)
        .data(data.unwrap_or_else(|_| "{}".to_string()))
}

async fn transcript_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>
) -> Result<Response, ApiError> {
    let conversation_id = ConversationId::parse(&conversation_id).map_err(|e|
        ApiError::new(e.into(), &state)
    )?;
    let transcript = state.relay
        .transcript(&conversation_id).await
        .map_err(|e| ApiError::new(e, &state))?;
    Ok(Json(transcript).into_response())
}

async fn reset_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>
) -> Result<StatusCode, ApiError> {
    let conversation_id = ConversationId::parse(&conversation_id).map_err(|e|
        ApiError::new(e.into(), &state)
    )?;
    let removed = state.relay
        .reset(&conversation_id).await
        .map_err(|e| ApiError::new(e, &state))?;
    Ok(if removed { StatusCode::NO_CONTENT } else { StatusCode::NOT_FOUND })
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
