//! Provider-specific configuration and detection.
//!
//! This module handles differences between LLM API providers, including
//! URL patterns and the protocol each one speaks natively.

use super::LlmProtocol;

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Anthropic (api.anthropic.com)
    Anthropic,
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Groq (groq.com)
    Groq,
    /// Generic OpenAI-compatible provider
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bilancio_chat::llm::Provider;
    ///
    /// let provider = Provider::detect_from_url("https://api.anthropic.com");
    /// assert_eq!(provider, Provider::Anthropic);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("anthropic.com") {
            Self::Anthropic
        } else if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Protocol used when the configuration says `auto`.
    #[must_use]
    pub fn default_protocol(self) -> LlmProtocol {
        match self {
            Self::Anthropic => LlmProtocol::Messages,
            Self::OpenAI | Self::OpenRouter | Self::Groq | Self::Generic => LlmProtocol::Chat,
        }
    }

    /// Build the Messages API URL.
    #[must_use]
    pub fn build_messages_url(self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        format!("{base}/v1/messages")
    }

    /// Build the chat completions URL for this provider.
    ///
    /// `OpenRouter` and Groq expose the `OpenAI` surface under a path prefix.
    #[must_use]
    pub fn build_chat_url(self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::OpenRouter if !base.ends_with("/api") => {
                format!("{base}/api/v1/chat/completions")
            }
            Self::Groq if !base.ends_with("/openai") => {
                format!("{base}/openai/v1/chat/completions")
            }
            _ => format!("{base}/v1/chat/completions"),
        }
    }
}
