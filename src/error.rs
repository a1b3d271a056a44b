//! Errors surfaced to callers of the chat API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::document::ExtractionError;
use crate::llm::ApiError;

/// Every failure a chat operation can report.
///
/// `Api` and `Transport` display exactly the originating error's message.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// A precondition is missing, e.g. no credential for the session.
    #[error("{0}")]
    Configuration(String),

    /// The request itself is malformed.
    #[error("{0}")]
    InvalidInput(String),

    /// No document has been loaded under this session ID.
    #[error("no document loaded for session {0}")]
    SessionNotFound(String),

    /// The session is still answering a previous message.
    #[error("a reply is already being generated for session {0}")]
    TurnInProgress(String),

    /// The upload could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The model service rejected or aborted the request.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request or the response stream failed in transit.
    #[error(transparent)]
    Transport(anyhow::Error),

    /// A report was requested before any answer exists.
    #[error("no analysis has been produced for this session yet")]
    EmptyReport,
}

impl ChatError {
    /// Classify a driver failure: [`ApiError`] if the service reported it,
    /// transport otherwise.
    pub fn from_driver(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => Self::Api(api),
            Err(other) => Self::Transport(other),
        }
    }

    /// Stable code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::TurnInProgress(_) => "TURN_IN_PROGRESS",
            Self::Extraction(_) => "EXTRACTION_ERROR",
            Self::Api(_) => "API_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::EmptyReport => "EMPTY_REPORT",
        }
    }

    /// HTTP status for the error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Configuration(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Extraction(ExtractionError::UnsupportedType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::Extraction(ExtractionError::Task(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Api(_) | Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::TurnInProgress(_) | Self::EmptyReport => StatusCode::CONFLICT,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        } else {
            tracing::warn!(error = %self, code = self.code(), "Request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
