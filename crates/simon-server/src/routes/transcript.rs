use axum::extract::{Multipart, Path, State};
use axum::Json;
use simon_core::session::Session;

use crate::error::AppError;
use crate::state::{AppState, SseMessage};

/// POST /api/sessions/{id}/transcript: multipart upload, `file` field.
///
/// Replaces the session's transcript and discards every artifact derived
/// from the previous one.
pub async fn upload_transcript(
    State(app): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    simon_core::paths::validate_session_id(&id)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("invalid upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("transcript").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("invalid upload: {e}")))?;
        upload = Some((name, bytes));
        break;
    }
    let (name, bytes) = upload.ok_or_else(|| AppError::bad_request("missing 'file' field"))?;

    let _guard = app
        .try_begin(&id)
        .ok_or_else(|| AppError::conflict(format!("a step is running for session '{id}'")))?;

    let root = app.root.clone();
    let session_id = id.clone();
    let session = tokio::task::spawn_blocking(move || {
        let mut session = Session::load(&root, &session_id)?;
        let transcript = simon_core::transcript::load(name, &bytes)?;
        session.set_transcript(transcript);
        session.save(&root)?;
        Ok::<_, simon_core::SimonError>(session)
    })
    .await
    .map_err(AppError::join)??;

    if let Some(t) = &session.transcript {
        tracing::info!(session = %id, source = %t.source_name, lines = t.line_count(), "transcript uploaded");
    }
    app.emit(SseMessage::SessionUpdated { session_id: id });

    let mut value = serde_json::to_value(session.summary())?;
    value["text"] = session
        .transcript
        .map(|t| serde_json::Value::String(t.text))
        .unwrap_or(serde_json::Value::Null);
    Ok(Json(value))
}

/// GET /api/sessions/{id}/transcript: the extracted transcript text.
pub async fn get_transcript(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let session = tokio::task::spawn_blocking(move || Session::load(&root, &id))
        .await
        .map_err(AppError::join)??;

    let transcript = session
        .transcript
        .ok_or(simon_core::SimonError::TranscriptMissing)?;
    Ok(Json(serde_json::to_value(transcript)?))
}
