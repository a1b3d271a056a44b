//! Protocol drivers against an in-process server replaying recorded streams.

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use bilancio_chat::error::ChatError;
use bilancio_chat::llm::{
    ApiKey, ChatCompletionsDriver, LlmDriver, LlmRequest, LlmSettings, Message, MessagesDriver,
};
use bilancio_chat::normalized::NormalizedEvent;
use futures::StreamExt;
use serde_json::Value;

const MESSAGES_STREAM: &str = "event: message_start\n\
data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"role\":\"assistant\"}}\n\n\
event: content_block_start\n\
data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
event: ping\n\
data: {\"type\":\"ping\"}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"I ricavi \"}}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"sono 100.\"}}\n\n\
event: content_block_stop\n\
data: {\"type\":\"content_block_stop\",\"index\":0}\n\n\
event: message_delta\n\
data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n\
event: message_stop\n\
data: {\"type\":\"message_stop\"}\n\n";

const MESSAGES_OVERLOADED: &str = "event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Parz\"}}\n\n\
event: error\n\
data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n";

const CHAT_STREAM: &str = "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n\
data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"I ricavi \"}}]}\n\n\
data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"sono 100.\"}}]}\n\n\
data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
data: [DONE]\n\n";

const CHAT_STREAM_UNTERMINATED: &str = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Utile 5.\"}}]}\n\n\
data: [DONE]";

const MESSAGES_STREAM_UNTERMINATED: &str = "event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Utile 5.\"}}\n\n\
event: message_stop\n\
data: {\"type\":\"message_stop\"}\n";

const TRUNCATED_CHAT_STREAM: &str =
    "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"I ricavi \"}}]}\n\n";

/// What the fake service saw, and what it answers.
#[derive(Clone)]
struct Upstream {
    status: StatusCode,
    body: &'static str,
    seen: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

async fn replay(State(upstream): State<Upstream>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    upstream.seen.lock().unwrap().push((headers, body));
    let content_type = if upstream.status.is_success() {
        "text/event-stream"
    } else {
        "application/json"
    };
    (
        upstream.status,
        [(header::CONTENT_TYPE, content_type)],
        upstream.body,
    )
        .into_response()
}

/// Serve `body` on both protocol paths; returns the base URL.
async fn spawn_upstream(status: StatusCode, body: &'static str) -> (String, Upstream) {
    let upstream = Upstream {
        status,
        body,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1/messages", post(replay))
        .route("/v1/chat/completions", post(replay))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), upstream)
}

fn request() -> LlmRequest {
    LlmRequest {
        api_key: ApiKey::new("sk-test").unwrap(),
        system: "Sei un analista.\n<bilancio>\nA\nB\n</bilancio>".to_string(),
        messages: vec![
            Message::user("Qual è il fatturato?"),
            Message::assistant("100."),
            Message::user("E l'utile?"),
        ],
        max_tokens: 512,
    }
}

async fn collect(driver: &dyn LlmDriver) -> (Vec<NormalizedEvent>, Option<anyhow::Error>) {
    let mut stream = match driver.stream(request()).await {
        Ok(stream) => stream,
        Err(err) => return (Vec::new(), Some(err)),
    };
    let mut events = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => events.push(event),
            Err(err) => return (events, Some(err)),
        }
    }
    (events, None)
}

fn deltas(events: &[NormalizedEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            NormalizedEvent::MessageDelta { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_messages_driver_streams_reply() {
    let (base_url, upstream) = spawn_upstream(StatusCode::OK, MESSAGES_STREAM).await;
    let driver = MessagesDriver::new(LlmSettings::new(base_url, "claude-3-sonnet-20240229"));

    let (events, err) = collect(&driver).await;
    assert!(err.is_none());
    assert_eq!(deltas(&events), "I ricavi sono 100.");
    assert_eq!(events.last(), Some(&NormalizedEvent::Done));

    let seen = upstream.seen.lock().unwrap();
    let (headers, body) = &seen[0];
    assert_eq!(headers["x-api-key"], "sk-test");
    assert_eq!(headers["anthropic-version"], "2023-06-01");
    assert_eq!(body["model"], "claude-3-sonnet-20240229");
    assert_eq!(body["max_tokens"], 512);
    assert_eq!(body["stream"], true);
    assert_eq!(body["system"], "Sei un analista.\n<bilancio>\nA\nB\n</bilancio>");

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[2]["content"], "E l'utile?");
}

#[tokio::test]
async fn test_messages_driver_error_event() {
    let (base_url, _upstream) = spawn_upstream(StatusCode::OK, MESSAGES_OVERLOADED).await;
    let driver = MessagesDriver::new(LlmSettings::new(base_url, "m"));

    let (events, err) = collect(&driver).await;
    assert_eq!(deltas(&events), "Parz");
    let err = ChatError::from_driver(err.unwrap());
    assert!(matches!(err, ChatError::Api(_)));
    assert_eq!(err.to_string(), "Overloaded");
}

#[tokio::test]
async fn test_messages_driver_http_error() {
    let (base_url, _upstream) = spawn_upstream(
        StatusCode::UNAUTHORIZED,
        r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
    )
    .await;
    let driver = MessagesDriver::new(LlmSettings::new(base_url, "m"));

    let (events, err) = collect(&driver).await;
    assert!(events.is_empty());
    let err = ChatError::from_driver(err.unwrap());
    assert_eq!(err.code(), "API_ERROR");
    assert_eq!(err.to_string(), "API returned 401 Unauthorized: invalid x-api-key");
}

#[tokio::test]
async fn test_chat_driver_streams_reply() {
    let (base_url, upstream) = spawn_upstream(StatusCode::OK, CHAT_STREAM).await;
    let driver = ChatCompletionsDriver::new(LlmSettings::new(base_url, "gpt-4o"));

    let (events, err) = collect(&driver).await;
    assert!(err.is_none());
    assert_eq!(deltas(&events), "I ricavi sono 100.");
    assert_eq!(events.last(), Some(&NormalizedEvent::Done));

    let seen = upstream.seen.lock().unwrap();
    let (headers, body) = &seen[0];
    assert_eq!(headers[header::AUTHORIZATION], "Bearer sk-test");

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "Sei un analista.\n<bilancio>\nA\nB\n</bilancio>");
    assert_eq!(
        messages.iter().filter(|m| m["role"] == "system").count(),
        1
    );
    assert_eq!(messages[3]["content"], "E l'utile?");
}

#[tokio::test]
async fn test_chat_driver_truncated_stream_has_no_completion() {
    let (base_url, _upstream) = spawn_upstream(StatusCode::OK, TRUNCATED_CHAT_STREAM).await;
    let driver = ChatCompletionsDriver::new(LlmSettings::new(base_url, "gpt-4o"));

    let (events, err) = collect(&driver).await;
    assert!(err.is_none());
    assert_eq!(deltas(&events), "I ricavi ");
    assert!(!events.contains(&NormalizedEvent::Done));
}

#[tokio::test]
async fn test_final_frame_without_blank_line_completes() {
    let (base_url, _upstream) = spawn_upstream(StatusCode::OK, CHAT_STREAM_UNTERMINATED).await;
    let driver = ChatCompletionsDriver::new(LlmSettings::new(base_url, "gpt-4o"));
    let (events, err) = collect(&driver).await;
    assert!(err.is_none());
    assert_eq!(deltas(&events), "Utile 5.");
    assert_eq!(events.last(), Some(&NormalizedEvent::Done));

    let (base_url, _upstream) =
        spawn_upstream(StatusCode::OK, MESSAGES_STREAM_UNTERMINATED).await;
    let driver = MessagesDriver::new(LlmSettings::new(base_url, "m"));
    let (events, err) = collect(&driver).await;
    assert!(err.is_none());
    assert_eq!(deltas(&events), "Utile 5.");
    assert_eq!(events.last(), Some(&NormalizedEvent::Done));
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let driver = MessagesDriver::new(LlmSettings::new(format!("http://{addr}"), "m"));
    let (_, err) = collect(&driver).await;
    let err = ChatError::from_driver(err.unwrap());
    assert!(matches!(err, ChatError::Transport(_)));
}
