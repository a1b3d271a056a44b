//! Turn-by-turn reply streaming.
//!
//! [`ResponseStreamer::reply`] records the user's turn, sends the whole
//! conversation to the model together with the session's instruction string,
//! relays text fragments as they arrive and, once the model marks the reply
//! complete, records the concatenated fragments as the assistant turn.
//!
//! A session runs one turn at a time. Dropping the returned stream cancels
//! the request and frees the session. A reply that never completes is not
//! recorded.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::error::ChatError;
use crate::llm::{LlmDriver, LlmRequest, LlmSettings};
use crate::normalized::NormalizedEvent;
use crate::session::Session;

/// Stream of reply fragments, in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Relays model replies for a session.
#[derive(Clone)]
pub struct ResponseStreamer {
    driver: Arc<dyn LlmDriver>,
    max_tokens: u32,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for ResponseStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStreamer")
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ResponseStreamer {
    /// Create a streamer over an explicit driver.
    pub fn new(driver: Arc<dyn LlmDriver>, max_tokens: u32) -> Self {
        Self { driver, max_tokens }
    }

    /// Create a streamer speaking the protocol `settings` resolve to.
    #[must_use]
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(settings.driver(), settings.max_tokens)
    }

    /// Submit `text` as the next user turn and stream the reply.
    ///
    /// The user turn is appended as submitted, before the request is sent,
    /// and stays in the history even if the reply fails. The assistant turn
    /// is appended only after the model signals completion. The session stays
    /// claimed until the returned stream finishes or is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidInput`] for a blank message,
    /// [`ChatError::Configuration`] when the session has no credential and
    /// [`ChatError::TurnInProgress`] while an earlier reply is still
    /// streaming. In each case nothing is appended and no request is made.
    /// Failures after the request starts are yielded by the stream.
    pub fn reply(&self, session: &Session, text: &str) -> Result<FragmentStream, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput("message must not be empty".to_string()));
        }
        let Some(api_key) = session.credential() else {
            return Err(ChatError::Configuration(
                "no API key configured for this session".to_string(),
            ));
        };
        let Some(guard) = session.try_begin_turn() else {
            return Err(ChatError::TurnInProgress(session.id().to_string()));
        };

        let turn = session.append_user(text);
        let request = LlmRequest {
            api_key,
            system: session.instruction().to_string(),
            messages: session.messages(),
            max_tokens: self.max_tokens,
        };

        tracing::info!(
            session_id = %session.id(),
            turn,
            history = request.messages.len(),
            "Streaming reply"
        );

        let driver = Arc::clone(&self.driver);
        let session = session.clone();

        let stream = async_stream::stream! {
            let _guard = guard;
            let mut events = match driver.stream(request).await {
                Ok(events) => events,
                Err(err) => {
                    let err = ChatError::from_driver(err);
                    tracing::warn!(session_id = %session.id(), error = %err, "Request failed");
                    yield Err(err);
                    return;
                }
            };

            let mut reply = String::new();
            while let Some(event) = events.next().await {
                match event {
                    Ok(NormalizedEvent::MessageDelta { text }) => {
                        reply.push_str(&text);
                        yield Ok(text);
                    }
                    Ok(NormalizedEvent::Done) => {
                        let len = session.append_assistant(reply.clone());
                        tracing::info!(
                            session_id = %session.id(),
                            characters = reply.len(),
                            history = len,
                            "Reply complete"
                        );
                        return;
                    }
                    // Drivers report failures as `Err`.
                    Ok(NormalizedEvent::StreamStart { .. } | NormalizedEvent::Error { .. }) => {}
                    Err(err) => {
                        let err = ChatError::from_driver(err);
                        tracing::warn!(session_id = %session.id(), error = %err, "Reply aborted");
                        yield Err(err);
                        return;
                    }
                }
            }

            tracing::warn!(session_id = %session.id(), "Reply ended without completion");
            yield Err(ChatError::Transport(anyhow::anyhow!(
                "response stream ended before the reply was complete"
            )));
        };

        Ok(Box::pin(stream))
    }
}
