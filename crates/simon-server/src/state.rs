use async_trait::async_trait;
use chat_client::{ChatCompleter, ChatError, ChatRequest, ClientConfig, Completion, OpenAiClient};
use serde::Serialize;
use simon_core::config::Config;
use simon_core::pipeline::StepProgress;
use simon_core::types::ArtifactKind;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::warn;

/// Lifecycle events pushed to `/api/events`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SseMessage {
    /// A session was created, deleted, or had its transcript replaced.
    SessionUpdated { session_id: String },
    StepStarted {
        session_id: String,
        step: ArtifactKind,
        calls: usize,
    },
    StepProgress {
        session_id: String,
        step: ArtifactKind,
        current: usize,
        total: usize,
        detail: String,
    },
    StepCompleted { session_id: String, step: ArtifactKind },
    StepFailed {
        session_id: String,
        step: ArtifactKind,
        error: String,
    },
}

impl SseMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            SseMessage::SessionUpdated { .. } => "session_updated",
            SseMessage::StepStarted { .. } => "step_started",
            SseMessage::StepProgress { .. } => "step_progress",
            SseMessage::StepCompleted { .. } => "step_completed",
            SseMessage::StepFailed { .. } => "step_failed",
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub completer: Arc<dyn ChatCompleter>,
    pub event_tx: broadcast::Sender<SseMessage>,
    /// Sessions with a step in flight.
    pub running: Arc<Mutex<HashSet<String>>>,
}

impl AppState {
    /// Load `.simon/config.yaml` (defaults when absent) and build an OpenAI
    /// client from the environment.
    pub fn new(root: PathBuf) -> Self {
        let config = Config::load_or_default(&root).unwrap_or_else(|e| {
            warn!(error = %e, "config.yaml unreadable, using defaults");
            Config::new("simon")
        });
        let completer = completer_from_config(&config);
        Self::with_parts(root, config, completer)
    }

    pub fn with_parts(root: PathBuf, config: Config, completer: Arc<dyn ChatCompleter>) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            root,
            config: Arc::new(config),
            completer,
            event_tx: tx,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Mark `session_id` busy. `None` when a step is already running for it.
    pub fn try_begin(&self, session_id: &str) -> Option<RunGuard> {
        let mut running = self.running.lock().unwrap_or_else(|p| p.into_inner());
        if !running.insert(session_id.to_string()) {
            return None;
        }
        Some(RunGuard {
            running: Arc::clone(&self.running),
            session_id: session_id.to_string(),
        })
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(session_id)
    }

    pub fn emit(&self, msg: SseMessage) {
        // No subscribers is fine.
        let _ = self.event_tx.send(msg);
    }
}

/// Clears the session's busy flag when dropped.
pub struct RunGuard {
    running: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.session_id);
    }
}

fn completer_from_config(config: &Config) -> Arc<dyn ChatCompleter> {
    let client = ClientConfig::from_env(
        &config.llm.base_url,
        &config.llm.api_key_env,
        Duration::from_secs(config.llm.timeout_secs),
    )
    .and_then(OpenAiClient::new);
    match client {
        Ok(c) => Arc::new(c),
        Err(e) => {
            warn!(error = %e, "model calls disabled");
            Arc::new(Unconfigured(config.llm.api_key_env.clone()))
        }
    }
}

/// Stand-in used when no API key is available; every call fails with
/// `MissingApiKey` so the UI can still browse sessions.
struct Unconfigured(String);

#[async_trait]
impl ChatCompleter for Unconfigured {
    async fn complete(&self, _request: ChatRequest) -> chat_client::Result<Completion> {
        Err(ChatError::MissingApiKey(self.0.clone()))
    }
}

/// Forwards pipeline progress to SSE subscribers.
pub struct SseProgress {
    pub session_id: String,
    pub tx: broadcast::Sender<SseMessage>,
}

impl StepProgress for SseProgress {
    fn started(&self, kind: ArtifactKind, calls: usize) {
        let _ = self.tx.send(SseMessage::StepStarted {
            session_id: self.session_id.clone(),
            step: kind,
            calls,
        });
    }

    fn task_progress(&self, kind: ArtifactKind, current: usize, total: usize, detail: &str) {
        let _ = self.tx.send(SseMessage::StepProgress {
            session_id: self.session_id.clone(),
            step: kind,
            current,
            total,
            detail: detail.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::with_parts(
            PathBuf::from("/tmp/test"),
            Config::new("t"),
            Arc::new(Unconfigured("OPENAI_API_KEY".into())),
        )
    }

    #[test]
    fn run_guard_releases_on_drop() {
        let app = state();
        let guard = app.try_begin("abc").unwrap();
        assert!(app.is_running("abc"));
        assert!(app.try_begin("abc").is_none());
        assert!(app.try_begin("other").is_some());
        drop(guard);
        assert!(!app.is_running("abc"));
    }

    #[test]
    fn sse_message_serializes_with_type_tag() {
        let msg = SseMessage::StepProgress {
            session_id: "s".into(),
            step: ArtifactKind::UseCaseSpecs,
            current: 1,
            total: 3,
            detail: "Login".into(),
        };
        assert_eq!(msg.event_name(), "step_progress");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "step_progress");
        assert_eq!(v["step"], "use_case_specs");
    }

    #[tokio::test]
    async fn unconfigured_completer_reports_missing_key() {
        let c = Unconfigured("MY_KEY".into());
        let err = c.complete(ChatRequest::new("gpt-4o")).await.unwrap_err();
        assert!(matches!(err, ChatError::MissingApiKey(k) if k == "MY_KEY"));
    }

    #[tokio::test]
    async fn progress_is_broadcast() {
        let app = state();
        let mut rx = app.event_tx.subscribe();
        let p = SseProgress {
            session_id: "s".into(),
            tx: app.event_tx.clone(),
        };
        p.started(ArtifactKind::Plan, 1);
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.event_name(), "step_started");
    }
}
