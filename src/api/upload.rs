//! Document upload handler.
//!
//! Accepts one PDF per request, extracts its text and starts (or resets) the
//! session that will answer questions about it.

use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::Serialize;

use crate::AppState;
use crate::document::ensure_pdf;
use crate::error::ChatError;
use crate::llm::ApiKey;

/// Response for a successfully loaded document.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Session to address follow-up requests to.
    pub session_id: String,
    /// Number of pages read.
    pub page_count: usize,
    /// Length of the extracted text, in characters.
    pub characters: usize,
    /// Whether the session already has a credential.
    pub has_credential: bool,
}

struct UploadedFile {
    filename: Option<String>,
    content_type: Option<String>,
    data: axum::body::Bytes,
}

/// POST /api/documents
///
/// Multipart fields: `file` (required), `api_key` and `session_id`
/// (optional). Passing the `session_id` of a live session discards that
/// session's conversation. An unknown `session_id` is rejected.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ChatError> {
    let mut file: Option<UploadedFile> = None;
    let mut api_key: Option<String> = None;
    let mut session_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ChatError::InvalidInput(format!("Failed to read multipart field: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(ToString::to_string);
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await.map_err(|e| {
                    ChatError::InvalidInput(format!("Failed to read uploaded file: {e}"))
                })?;
                file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            "api_key" => {
                api_key = Some(field.text().await.map_err(|e| {
                    ChatError::InvalidInput(format!("Failed to read api_key: {e}"))
                })?);
            }
            "session_id" => {
                let id = field.text().await.map_err(|e| {
                    ChatError::InvalidInput(format!("Failed to read session_id: {e}"))
                })?;
                session_id = Some(id.trim().to_string()).filter(|id| !id.is_empty());
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let Some(file) = file else {
        return Err(ChatError::InvalidInput("missing multipart field `file`".to_string()));
    };

    // Only a live session can be reset.
    let existing = session_id
        .map(|id| state.sessions.get(&id).ok_or(ChatError::SessionNotFound(id)))
        .transpose()?;

    let max = state.config.server.max_upload_bytes;
    if file.data.len() > max {
        return Err(ChatError::InvalidInput(format!(
            "file exceeds max size ({}MB > {}MB)",
            file.data.len() / (1024 * 1024),
            max / (1024 * 1024)
        )));
    }

    ensure_pdf(file.content_type.as_deref(), file.filename.as_deref())?;

    let document = state.loader.load(&file.data).await?;
    let characters = document.text.chars().count();

    // A new document resets the conversation but not the credential.
    let (session, previous_key) = match existing {
        Some(existing) => (
            state.sessions.replace(existing.id(), document.text),
            existing.credential(),
        ),
        None => (state.sessions.start(document.text), None),
    };
    let key = api_key.and_then(ApiKey::new).or(previous_key);
    if key.is_some() {
        session.set_credential(key);
    }

    tracing::info!(
        name: "document.loaded",
        session_id = %session.id(),
        filename = ?file.filename,
        loader = state.loader.loader_name(),
        page_count = document.page_count,
        characters,
        "Document loaded"
    );

    Ok(Json(UploadResponse {
        session_id: session.id().to_string(),
        page_count: document.page_count,
        characters,
        has_credential: session.credential().is_some(),
    }))
}
