use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use simon_core::session::Session;

use crate::error::AppError;
use crate::state::{AppState, SseMessage};

/// GET /api/sessions: summaries of every session, newest first.
pub async fn list_sessions(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let sessions = Session::list(&root)?;
        let summaries: Vec<_> = sessions.iter().map(Session::summary).collect();
        Ok::<_, simon_core::SimonError>(serde_json::to_value(summaries)?)
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// POST /api/sessions: create an empty session.
pub async fn create_session(
    State(app): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let root = app.root.clone();
    let session = tokio::task::spawn_blocking(move || Session::create(&root))
        .await
        .map_err(AppError::join)??;

    tracing::info!(session = %session.id, "session created");
    app.emit(SseMessage::SessionUpdated {
        session_id: session.id.clone(),
    });
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(session.summary())?),
    ))
}

/// GET /api/sessions/{id}: transcript presence, generated artifacts, and
/// which step buttons are available.
pub async fn get_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let session = tokio::task::spawn_blocking(move || Session::load(&root, &id))
        .await
        .map_err(AppError::join)??;

    let mut value = serde_json::to_value(session.summary())?;
    value["running"] = serde_json::Value::Bool(app.is_running(&session.id));
    Ok(Json(value))
}

/// DELETE /api/sessions/{id}
pub async fn delete_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let _guard = app
        .try_begin(&id)
        .ok_or_else(|| AppError::conflict(format!("a step is running for session '{id}'")))?;
    let root = app.root.clone();
    let target = id.clone();
    tokio::task::spawn_blocking(move || Session::delete(&root, &target))
        .await
        .map_err(AppError::join)??;

    tracing::info!(session = %id, "session deleted");
    app.emit(SseMessage::SessionUpdated {
        session_id: id.clone(),
    });
    Ok(Json(serde_json::json!({ "id": id, "deleted": true })))
}
