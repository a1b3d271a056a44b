//! Conversation handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::sse::build_sse_response;
use crate::AppState;
use crate::analysis::AnalysisKind;
use crate::error::ChatError;
use crate::llm::{ApiKey, MessageRole};
use crate::normalized::NormalizedEvent;
use crate::session::Session;

/// Body of a new turn: free text or one of the presets.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub analysis: Option<AnalysisKind>,
}

impl MessageRequest {
    fn into_text(self) -> Result<String, ChatError> {
        match (self.analysis, self.message) {
            (Some(kind), None) => Ok(kind.prompt()),
            (None, Some(message)) => Ok(message),
            (Some(_), Some(_)) => Err(ChatError::InvalidInput(
                "provide either `message` or `analysis`, not both".to_string(),
            )),
            (None, None) => Err(ChatError::InvalidInput(
                "provide `message` or `analysis`".to_string(),
            )),
        }
    }
}

/// Body of a credential update.
#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    pub api_key: String,
}

/// Message DTO for API responses.
#[derive(Debug, Serialize)]
pub struct MessageDto {
    pub role: MessageRole,
    pub content: String,
}

/// Preset DTO for API responses.
#[derive(Debug, Serialize)]
pub struct AnalysisDto {
    pub kind: AnalysisKind,
    pub label: &'static str,
}

pub(crate) fn session_or_404(state: &AppState, id: &str) -> Result<Session, ChatError> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))
}

/// POST /api/sessions/{id}/messages - Submit a turn and stream the reply.
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Response, ChatError> {
    let session = session_or_404(&state, &id)?;
    let text = req.into_text()?;
    let mut fragments = state.streamer.reply(&session, &text)?;

    let request_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(session_id = %id, request_id = %request_id, "Starting SSE stream");

    let events = async_stream::stream! {
        yield NormalizedEvent::StreamStart { request_id: request_id.clone() };

        while let Some(item) = fragments.next().await {
            match item {
                Ok(text) => yield NormalizedEvent::MessageDelta { text },
                Err(err) => {
                    tracing::error!(
                        request_id = %request_id,
                        error = %err,
                        code = err.code(),
                        "Stream error"
                    );
                    yield NormalizedEvent::Error {
                        message: err.to_string(),
                        code: Some(err.code().to_string()),
                    };
                    return;
                }
            }
        }

        tracing::info!(request_id = %request_id, "Stream complete");
        yield NormalizedEvent::Done;
    };

    Ok(build_sse_response(events).into_response())
}

/// GET /api/sessions/{id}/messages - Get session messages.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageDto>>, ChatError> {
    let session = session_or_404(&state, &id)?;
    let messages = session
        .messages()
        .into_iter()
        .map(|m| MessageDto {
            role: m.role(),
            content: m.content().to_string(),
        })
        .collect();
    Ok(Json(messages))
}

/// PUT /api/sessions/{id}/credential - Set the credential for a session.
pub async fn put_credential(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CredentialRequest>,
) -> Result<StatusCode, ChatError> {
    let session = session_or_404(&state, &id)?;
    let Some(key) = ApiKey::new(req.api_key) else {
        return Err(ChatError::InvalidInput("api_key must not be empty".to_string()));
    };
    session.set_credential(Some(key));
    tracing::info!(session_id = %id, "Credential updated");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/sessions/{id}
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    match state.sessions.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// GET /api/analyses - List the canned analyses.
pub async fn list_analyses() -> Json<Vec<AnalysisDto>> {
    Json(
        AnalysisKind::ALL
            .into_iter()
            .map(|kind| AnalysisDto {
                kind,
                label: kind.label(),
            })
            .collect(),
    )
}
