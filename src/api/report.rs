//! Markdown report download.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use super::chat::session_or_404;
use crate::AppState;
use crate::error::ChatError;
use crate::report::{REPORT_CONTENT_TYPE, REPORT_FILENAME, render_report};

/// GET /api/sessions/{id}/report - Download the answers as Markdown.
pub async fn download_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ChatError> {
    let session = session_or_404(&state, &id)?;
    let report = render_report(&session.messages()).ok_or(ChatError::EmptyReport)?;

    tracing::info!(session_id = %id, bytes = report.len(), "Report generated");

    Ok((
        [
            (header::CONTENT_TYPE, REPORT_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{REPORT_FILENAME}\""),
            ),
        ],
        report,
    )
        .into_response())
}
