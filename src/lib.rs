//! Bilancio Chat
//!
//! A streaming chat service over an uploaded financial statement: the user
//! loads a PDF, the service extracts its text, and every question is answered
//! by a hosted model instructed to act as a financial analyst with the full
//! statement in context.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with SSE streaming
//! - **Documents**: PDF text extraction behind a loader trait
//! - **Sessions**: in-memory conversation state, one document per session
//! - **LLM**: protocol-agnostic drivers for the Messages and Chat Completions APIs
//!
//! # Modules
//!
//! - [`analysis`]: canned analyses
//! - [`api`]: HTTP handlers
//! - [`document`]: document loading
//! - [`llm`]: LLM driver traits and implementations
//! - [`normalized`]: Unified streaming event model
//! - [`report`]: Markdown report of a session's answers
//! - [`session`]: Conversation and session management
//! - [`streamer`]: relays replies and records them in the session

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod analysis;
pub mod api;
pub mod config;
pub mod document;
pub mod error;
pub mod llm;
pub mod normalized;
pub mod report;
pub mod server;
pub mod session;
pub mod streamer;

use crate::config::AppConfig;

use document::DocumentLoader;
use session::SessionStore;
use std::sync::Arc;
use streamer::ResponseStreamer;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Global Configuration
    pub config: Arc<AppConfig>,
    /// Session store for conversation management.
    pub sessions: SessionStore,
    /// Turns uploads into text.
    pub loader: Arc<dyn DocumentLoader>,
    /// Streams model replies into sessions.
    pub streamer: Arc<ResponseStreamer>,
}
