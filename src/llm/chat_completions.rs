//! `OpenAI` Chat Completions API driver.
//!
//! This module implements the [`LlmDriver`] trait for the `OpenAI` Chat
//! Completions API (`/v1/chat/completions`) and compatible services. The
//! instruction string becomes one leading `system` message.

use futures::StreamExt;

use crate::normalized::NormalizedEvent;

use super::sse::{SseDecoder, SseFrame};
use super::{ApiError, EventStream, LlmDriver, LlmRequest, LlmSettings};

/// Driver for the `OpenAI` Chat Completions API.
///
/// Connects to `/v1/chat/completions` and streams responses as
/// [`NormalizedEvent`]s.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }
}

/// Request body: the system message first, then the history in order.
fn request_body(model: &str, req: &LlmRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    messages.push(serde_json::json!({ "role": "system", "content": req.system }));
    messages.extend(req.messages.iter().map(|m| serde_json::json!(m)));

    serde_json::json!({
        "model": model,
        "stream": true,
        "max_tokens": req.max_tokens,
        "messages": messages,
    })
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        let url = self.settings.provider.build_chat_url(&self.settings.base_url);
        let body = request_body(&self.settings.model, &req);

        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            message_count = req.messages.len(),
            "Sending chat completions request"
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(req.api_key.expose())
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

fn decode_frame(frame: &SseFrame) -> anyhow::Result<Option<NormalizedEvent>> {
    let data = frame.data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(NormalizedEvent::Done));
    }

    let v: serde_json::Value = serde_json::from_str(data)?;
    if v.get("error").is_some() {
        return Err(ApiError::from_event(&v).into());
    }

    // Assistant text delta
    let text = v["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty());

    Ok(text.map(|s| NormalizedEvent::MessageDelta {
        text: s.to_string(),
    }))
}
