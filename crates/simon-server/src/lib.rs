pub mod embed;
pub mod error;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router for a project root, loading its config and
/// creating the model client from the environment.
pub fn build_router(root: PathBuf) -> Router {
    build_router_with(state::AppState::new(root))
}

/// Build the Router around an existing state. Integration tests use this to
/// inject a scripted model client.
pub fn build_router_with(app_state: state::AppState) -> Router {
    let upload_limit = app_state.config.server.max_upload_bytes();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Config
        .route("/api/config", get(routes::config::get_config))
        // Sessions
        .route(
            "/api/sessions",
            get(routes::sessions::list_sessions).post(routes::sessions::create_session),
        )
        .route(
            "/api/sessions/{id}",
            get(routes::sessions::get_session).delete(routes::sessions::delete_session),
        )
        // Transcript
        .route(
            "/api/sessions/{id}/transcript",
            get(routes::transcript::get_transcript).post(routes::transcript::upload_transcript),
        )
        // Steps and their artifacts
        .route(
            "/api/sessions/{id}/steps/{kind}",
            post(routes::steps::run_step),
        )
        .route(
            "/api/sessions/{id}/artifacts/{kind}",
            get(routes::artifacts::get_artifact),
        )
        .route(
            "/api/sessions/{id}/use-cases",
            get(routes::artifacts::get_use_cases),
        )
        // Export
        .route(
            "/api/sessions/{id}/export",
            get(routes::export::export_session),
        )
        .fallback(embed::static_handler)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the web UI server on `port`.
pub async fn serve(root: PathBuf, port: u16, open_browser: bool) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(root, listener, open_browser).await
}

/// Start the web UI server on a pre-bound listener.
///
/// The caller can bind port 0 and read the actual port before starting.
pub async fn serve_on(
    root: PathBuf,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(root);

    tracing::info!("simon UI listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}");
        if let Err(e) = open::that(&url) {
            tracing::warn!(error = %e, "could not open browser");
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}
