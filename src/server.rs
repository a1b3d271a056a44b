use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::api;
use crate::config::AppConfig;
use crate::document::PdfLoader;
use crate::session::SessionStore;
use crate::streamer::ResponseStreamer;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the application router over `state`.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .server
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let settings = config.llm_settings();
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        protocol = ?settings.resolved_protocol(),
        provider = ?settings.provider,
        max_tokens = settings.max_tokens,
        "LLM configuration loaded"
    );

    let state = AppState {
        config: Arc::clone(&config),
        sessions: SessionStore::new(),
        loader: Arc::new(PdfLoader::new()),
        streamer: Arc::new(ResponseStreamer::from_settings(&settings)),
    };

    spawn_session_sweeper(&state.sessions, &config);

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

fn spawn_session_sweeper(sessions: &SessionStore, config: &AppConfig) {
    let sessions = sessions.clone();
    let timeout = config.sessions.idle_timeout();
    let mut interval = tokio::time::interval(config.sessions.sweep_interval());

    tokio::spawn(async move {
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_expired_with_timeout(timeout);
            if removed > 0 {
                info!(
                    name: "sessions.expired",
                    removed,
                    remaining = sessions.len(),
                    "Expired idle sessions"
                );
            }
        }
    });
}
