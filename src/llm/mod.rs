//! LLM driver traits and implementations.
//!
//! This module provides protocol-agnostic abstractions for streaming text
//! generation from a hosted model, supporting both the Anthropic Messages API
//! and `OpenAI`-compatible Chat Completions.
//!
//! # Overview
//!
//! The [`LlmDriver`] trait defines the core streaming interface. Drivers turn
//! an [`LlmRequest`] into a stream of [`NormalizedEvent`]s; the
//! [`ResponseStreamer`](crate::streamer::ResponseStreamer) builds on top of a
//! driver to relay fragments and record the assistant turn.
//!
//! # Drivers
//!
//! - [`MessagesDriver`]: Anthropic Messages API (`/v1/messages`)
//! - [`ChatCompletionsDriver`]: `OpenAI` Chat Completions API (`/v1/chat/completions`)
//!
//! # Instruction handling
//!
//! The instruction string travels in [`LlmRequest::system`] and is placed in
//! the protocol's dedicated system slot exactly once per request. It is never
//! part of [`LlmRequest::messages`].

pub mod chat_completions;
pub mod messages;
pub mod provider;
pub mod sse;

pub use chat_completions::ChatCompletionsDriver;
pub use messages::MessagesDriver;
pub use provider::Provider;

use std::sync::Arc;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::normalized::NormalizedEvent;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";

/// Upper bound on generated tokens when none is configured.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.anthropic.com`).
    pub base_url: String,
    /// Model identifier (e.g., `claude-3-sonnet-20240229`).
    pub model: String,
    /// Protocol to use for communication.
    pub protocol: LlmProtocol,
    /// Provider type (auto-detected from `base_url`).
    pub provider: Provider,
    /// Maximum number of tokens the model may generate per reply.
    pub max_tokens: u32,
}

impl LlmSettings {
    /// Build settings for `base_url`, detecting the provider from the URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            provider: Provider::detect_from_url(&base_url),
            base_url,
            model: model.into(),
            protocol: LlmProtocol::Auto,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// The protocol actually spoken: `Auto` resolves through the provider.
    #[must_use]
    pub fn resolved_protocol(&self) -> LlmProtocol {
        match self.protocol {
            LlmProtocol::Auto => self.provider.default_protocol(),
            explicit => explicit,
        }
    }

    /// Create the driver matching [`Self::resolved_protocol`].
    #[must_use]
    pub fn driver(&self) -> Arc<dyn LlmDriver> {
        match self.resolved_protocol() {
            LlmProtocol::Chat => Arc::new(ChatCompletionsDriver::new(self.clone())),
            LlmProtocol::Messages | LlmProtocol::Auto => {
                Arc::new(MessagesDriver::new(self.clone()))
            }
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }
}

/// LLM protocol variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProtocol {
    /// Pick the protocol from the detected provider.
    #[default]
    Auto,
    /// Anthropic Messages API (`/v1/messages`).
    Messages,
    /// `OpenAI` Chat Completions API (`/v1/chat/completions`).
    Chat,
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// One turn of a conversation.
///
/// Fields are private: a message cannot be edited once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: MessageRole,
    content: String,
}

impl Message {
    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Role of the author.
    #[must_use]
    pub fn role(&self) -> MessageRole {
        self.role
    }

    /// Text of the message.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// API credential supplied by the user.
///
/// Held in memory only. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a credential, rejecting blank input.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// The raw credential, for request headers only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Request to an LLM driver.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Credential for this call.
    pub api_key: ApiKey,
    /// Instruction string, sent once in the protocol's system slot.
    pub system: String,
    /// Ordered conversation history, ending with the new user turn.
    pub messages: Vec<Message>,
    /// Maximum output length.
    pub max_tokens: u32,
}

/// Failure reported by the remote service itself (HTTP error status or an
/// in-stream error event), as opposed to a transport failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status, when the failure came with one.
    pub status: Option<u16>,
    /// Provider error type (e.g. `overloaded_error`), when reported.
    pub kind: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ApiError {
    /// Build an error from an HTTP status and the raw response body.
    ///
    /// Both Anthropic and `OpenAI` report `{"error": {"type", "message"}}`;
    /// anything else is passed through verbatim.
    #[must_use]
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let error = parsed.as_ref().map(|v| &v["error"]);
        let kind = error
            .and_then(|e| e.get("type"))
            .and_then(|t| t.as_str())
            .map(ToString::to_string);
        let detail = error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map_or_else(|| body.trim().to_string(), ToString::to_string);

        let message = if detail.is_empty() {
            format!("API returned {status}")
        } else {
            format!("API returned {status}: {detail}")
        };

        Self {
            status: Some(status.as_u16()),
            kind,
            message,
        }
    }

    /// Build an error from an in-stream `error` payload.
    #[must_use]
    pub fn from_event(payload: &serde_json::Value) -> Self {
        let error = &payload["error"];
        Self {
            status: None,
            kind: error["type"].as_str().map(ToString::to_string),
            message: error["message"]
                .as_str()
                .unwrap_or("the model service reported an error")
                .to_string(),
        }
    }
}

/// Boxed stream of driver events.
pub type EventStream =
    std::pin::Pin<Box<dyn Stream<Item = anyhow::Result<NormalizedEvent>> + Send>>;

/// Trait for LLM streaming drivers.
///
/// Implementations emit [`NormalizedEvent::MessageDelta`] for each text
/// fragment and [`NormalizedEvent::Done`] once the service marks the reply
/// complete. Service-reported failures are returned as [`ApiError`] inside
/// the `anyhow::Error`; anything else is a transport failure.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Stream a response from the LLM.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the connection is interrupted.
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream>;
}
