use axum::extract::{Path, State};
use axum::Json;
use simon_core::pipeline::{self, StepOutcome};
use simon_core::session::Session;
use simon_core::types::ArtifactKind;
use simon_core::SimonError;
use tracing::{info, warn};

use crate::error::AppError;
use crate::state::{AppState, SseMessage, SseProgress};

/// POST /api/sessions/{id}/steps/{kind}: run one step of the chain.
///
/// The request waits for the model and answers with the stored artifact.
/// Progress is also broadcast on `/api/events`. A session runs one step at a
/// time; a second request while one is in flight gets 409.
///
/// The step runs in its own task holding the session's run guard, so it
/// still finishes and saves if the client disconnects.
pub async fn run_step(
    State(app): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let kind: ArtifactKind = kind.parse()?;
    simon_core::paths::validate_session_id(&id)?;

    let guard = app
        .try_begin(&id)
        .ok_or_else(|| AppError::conflict(format!("a step is already running for '{id}'")))?;

    let task_app = app.clone();
    let task_id = id.clone();
    let handle = tokio::spawn(async move {
        let _guard = guard;
        execute(task_app, task_id, kind).await
    });
    let (outcome, session) = handle.await.map_err(AppError::join)??;

    Ok(Json(serde_json::json!({
        "outcome": outcome,
        "artifact": session.artifact(kind),
        "session": session.summary(),
    })))
}

/// Load, run, save. Emits `step_completed` or `step_failed`.
async fn execute(
    app: AppState,
    id: String,
    kind: ArtifactKind,
) -> Result<(StepOutcome, Session), AppError> {
    let root = app.root.clone();
    let session_id = id.clone();
    let mut session = tokio::task::spawn_blocking(move || Session::load(&root, &session_id))
        .await
        .map_err(AppError::join)??;

    let progress = SseProgress {
        session_id: id.clone(),
        tx: app.event_tx.clone(),
    };
    let result = pipeline::run_step(
        app.completer.as_ref(),
        &app.config,
        &mut session,
        kind,
        &progress,
    )
    .await;

    let outcome = match result {
        Ok(o) => o,
        Err(e) => {
            if !matches!(e, SimonError::Blocked { .. }) {
                warn!(session = %id, step = %kind, error = %e, "step failed");
                app.emit(SseMessage::StepFailed {
                    session_id: id.clone(),
                    step: kind,
                    error: e.to_string(),
                });
            }
            return Err(e.into());
        }
    };

    let root = app.root.clone();
    let session = tokio::task::spawn_blocking(move || {
        session.save(&root)?;
        Ok::<_, SimonError>(session)
    })
    .await
    .map_err(AppError::join)??;

    info!(session = %id, step = %kind, calls = outcome.calls, failures = outcome.failures, "step completed");
    app.emit(SseMessage::StepCompleted {
        session_id: id,
        step: kind,
    });
    Ok((outcome, session))
}
