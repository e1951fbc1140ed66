use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use simon_core::session::Session;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/sessions/{id}/export: every artifact as one markdown document.
pub async fn export_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let root = app.root.clone();
    let session = tokio::task::spawn_blocking(move || Session::load(&root, &id))
        .await
        .map_err(AppError::join)??;

    let markdown = simon_core::export::render_markdown(&session, &app.config.project.name);
    let disposition = format!("attachment; filename=\"requirements-{}.md\"", session.id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        markdown,
    ))
}
