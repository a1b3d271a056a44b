//! HTTP API.
//!
//! - `POST /api/documents`: upload a PDF and start a session
//! - `PUT /api/sessions/{id}/credential`: set the session's API key
//! - `POST /api/sessions/{id}/messages`: ask a question, reply streamed as SSE
//! - `GET /api/sessions/{id}/messages`: conversation so far
//! - `GET /api/sessions/{id}/report`: answers as a Markdown download
//! - `DELETE /api/sessions/{id}`: drop a session
//! - `GET /api/analyses`: canned analyses

pub mod chat;
pub mod report;
pub mod sse;
pub mod upload;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::AppState;

/// Routes under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/documents", post(upload::upload_handler))
        .route("/analyses", get(chat::list_analyses))
        .route("/sessions/{id}", delete(chat::delete_session))
        .route("/sessions/{id}/credential", put(chat::put_credential))
        .route(
            "/sessions/{id}/messages",
            post(chat::post_message).get(chat::get_messages),
        )
        .route("/sessions/{id}/report", get(report::download_report))
}
