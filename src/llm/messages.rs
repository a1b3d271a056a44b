//! Anthropic Messages API driver.
//!
//! This module implements the [`LlmDriver`] trait for the Messages API
//! (`/v1/messages`) with `stream: true`. Text arrives as
//! `content_block_delta` events carrying a `text_delta`; `message_stop`
//! closes the reply and an `error` event aborts it.

use futures::StreamExt;
use serde::Serialize;

use crate::normalized::NormalizedEvent;

use super::sse::{SseDecoder, SseFrame};
use super::{ApiError, EventStream, LlmDriver, LlmRequest, LlmSettings, Message};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// Driver for the Anthropic Messages API.
#[derive(Clone)]
pub struct MessagesDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for MessagesDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagesDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl MessagesDriver {
    /// Create a new Messages driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait::async_trait]
impl LlmDriver for MessagesDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        let url = self
            .settings
            .provider
            .build_messages_url(&self.settings.base_url);

        let body = ApiRequest {
            model: &self.settings.model,
            max_tokens: req.max_tokens,
            system: &req.system,
            messages: &req.messages,
            stream: true,
        };

        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            message_count = req.messages.len(),
            "Sending Messages API request"
        );

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", req.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &text).into());
        }

        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            let mut done = false;

            futures::pin_mut!(byte_stream);
            'read: while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                for frame in decoder.push(&chunk) {
                    if let Some(event) = decode_frame(&frame)? {
                        done = event == NormalizedEvent::Done;
                        yield event;
                        if done {
                            break 'read;
                        }
                    }
                }
            }

            // Trailing frame without a blank line after it.
            if !done {
                if let Some(frame) = decoder.finish() {
                    if let Some(event) = decode_frame(&frame)? {
                        yield event;
                    }
                }
            }
        };

        Ok(Box::pin(out))
    }
}

/// Map one SSE frame to an event; frames without text are skipped.
fn decode_frame(frame: &SseFrame) -> anyhow::Result<Option<NormalizedEvent>> {
    if frame.data.is_empty() {
        return Ok(None);
    }
    let v: serde_json::Value = serde_json::from_str(&frame.data)?;
    let kind = v["type"].as_str().or(frame.event.as_deref()).unwrap_or("");

    match kind {
        "content_block_delta" => {
            let delta = &v["delta"];
            if delta["type"] == "text_delta" {
                if let Some(text) = delta["text"].as_str().filter(|t| !t.is_empty()) {
                    return Ok(Some(NormalizedEvent::MessageDelta {
                        text: text.to_string(),
                    }));
                }
            }
            Ok(None)
        }
        "message_stop" => Ok(Some(NormalizedEvent::Done)),
        "error" => Err(ApiError::from_event(&v).into()),
        // message_start, content_block_start/stop, message_delta, ping
        _ => Ok(None),
    }
}
