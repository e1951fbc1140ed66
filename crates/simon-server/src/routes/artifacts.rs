use axum::extract::{Path, State};
use axum::Json;
use simon_core::session::Session;
use simon_core::types::ArtifactKind;
use simon_core::SimonError;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/sessions/{id}/artifacts/{kind}: one stored artifact.
pub async fn get_artifact(
    State(app): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let kind: ArtifactKind = kind.parse()?;
    let root = app.root.clone();
    let result = tokio::task::spawn_blocking(move || {
        let session = Session::load(&root, &id)?;
        let record = session
            .artifact(kind)
            .ok_or_else(|| SimonError::ArtifactNotFound(kind.to_string()))?;
        Ok::<_, SimonError>(serde_json::json!({
            "kind": kind,
            "heading": kind.heading(),
            "content": record.content,
            "model": record.model,
            "generated_at": record.generated_at,
            "usage": record.usage,
            "stale": session.is_stale(kind),
        }))
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(result))
}

/// GET /api/sessions/{id}/use-cases: parsed use cases and their
/// generated specifications.
pub async fn get_use_cases(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let session = tokio::task::spawn_blocking(move || Session::load(&root, &id))
        .await
        .map_err(AppError::join)??;

    Ok(Json(serde_json::json!({
        "use_cases": session.use_cases,
        "specs": session.use_case_specs,
    })))
}
