use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chat_client::ChatError;
use simon_core::error::SimonError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit statuses
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP status through the `anyhow::Error` chain for
/// failures that have no `SimonError` variant (busy session, bad upload).
#[derive(Debug)]
struct StatusError(StatusCode, String);

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.1)
    }
}

impl std::error::Error for StatusError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusError(StatusCode::BAD_REQUEST, msg.into()).into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(StatusError(StatusCode::CONFLICT, msg.into()).into())
    }

    pub fn join(e: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {e}"))
    }

    fn status(&self) -> StatusCode {
        if let Some(s) = self.0.downcast_ref::<StatusError>() {
            return s.0;
        }
        if let Some(e) = self.0.downcast_ref::<SimonError>() {
            return simon_status(e);
        }
        if let Some(e) = self.0.downcast_ref::<ChatError>() {
            return chat_status(e);
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn simon_status(e: &SimonError) -> StatusCode {
    match e {
        SimonError::SessionNotFound(_)
        | SimonError::ArtifactNotFound(_)
        | SimonError::TranscriptMissing => StatusCode::NOT_FOUND,
        SimonError::Blocked { .. } => StatusCode::CONFLICT,
        SimonError::NotInitialized
        | SimonError::InvalidSessionId(_)
        | SimonError::UnknownArtifact(_)
        | SimonError::EmptyTranscript
        | SimonError::InvalidDocument(_)
        | SimonError::NoUseCases => StatusCode::BAD_REQUEST,
        SimonError::Completion { source, .. } => chat_status(source),
        SimonError::Io(_) | SimonError::Yaml(_) | SimonError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn chat_status(e: &ChatError) -> StatusCode {
    if e.is_upstream() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<anyhow::Error>) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn session_not_found_maps_to_404() {
        assert_eq!(
            status_of(SimonError::SessionNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn artifact_not_found_maps_to_404() {
        assert_eq!(
            status_of(SimonError::ArtifactNotFound("plan".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn blocked_maps_to_409() {
        let err = SimonError::Blocked {
            step: "workflow".into(),
            missing: vec!["plan".into()],
        };
        assert_eq!(status_of(err), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_inputs_map_to_400() {
        assert_eq!(
            status_of(SimonError::InvalidSessionId("..".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SimonError::UnknownArtifact("nope".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SimonError::InvalidDocument("bad zip".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_api_key_maps_to_503() {
        let err = SimonError::Completion {
            step: "plan".into(),
            source: ChatError::MissingApiKey("OPENAI_API_KEY".into()),
        };
        assert_eq!(status_of(err), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn upstream_failure_maps_to_502() {
        let err = SimonError::Completion {
            step: "plan".into(),
            source: ChatError::Api {
                status: 429,
                message: "rate limited".into(),
            },
        };
        assert_eq!(status_of(err), StatusCode::BAD_GATEWAY);
        assert_eq!(status_of(ChatError::EmptyResponse), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn io_error_maps_to_500() {
        let io_err = std::io::Error::other("disk full");
        assert_eq!(
            status_of(SimonError::Io(io_err)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn non_simon_error_maps_to_500() {
        assert_eq!(
            status_of(anyhow::anyhow!("something unexpected")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn constructors_carry_their_status() {
        assert_eq!(
            AppError::conflict("busy").into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::bad_request("no file").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError(SimonError::SessionNotFound("s".into()).into()).into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
