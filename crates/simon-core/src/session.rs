use crate::error::{Result, SimonError};
use crate::paths;
use crate::prompts::PromptInputs;
use crate::transcript::{Transcript, TranscriptFormat};
use crate::types::{ArtifactKind, Requirement, UseCase, UseCaseSpec};
use chat_client::TokenUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// ArtifactRecord
// ---------------------------------------------------------------------------

/// The latest text produced by one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub content: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ArtifactRecord {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            generated_at: Utc::now(),
            usage: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything produced for one transcript, keyed by step.
///
/// Persisted as `.simon/sessions/<id>.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
    #[serde(default)]
    pub artifacts: BTreeMap<ArtifactKind, ArtifactRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_cases: Vec<UseCase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_case_specs: Vec<UseCaseSpec>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            transcript: None,
            artifacts: BTreeMap::new(),
            use_cases: Vec::new(),
            use_case_specs: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn create(root: &Path) -> Result<Self> {
        let session = Self::new();
        session.save(root)?;
        Ok(session)
    }

    pub fn load(root: &Path, id: &str) -> Result<Self> {
        paths::validate_session_id(id)?;
        let path = paths::session_path(root, id);
        if !path.exists() {
            return Err(SimonError::SessionNotFound(id.to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let session: Session = serde_yaml::from_str(&data)?;
        Ok(session)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        paths::validate_session_id(&self.id)?;
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::session_path(root, &self.id), data.as_bytes())
    }

    /// All sessions, most recently updated first. Unreadable files are
    /// skipped with a warning.
    pub fn list(root: &Path) -> Result<Vec<Session>> {
        let dir = paths::sessions_dir(root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(SimonError::from)
                .and_then(|data| serde_yaml::from_str::<Session>(&data).map_err(Into::into));
            match parsed {
                Ok(s) => sessions.push(s),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session"),
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    pub fn delete(root: &Path, id: &str) -> Result<()> {
        paths::validate_session_id(id)?;
        let path = paths::session_path(root, id);
        if !path.exists() {
            return Err(SimonError::SessionNotFound(id.to_string()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Replace the transcript. Every artifact was derived from the previous
    /// transcript, so all of them are discarded.
    pub fn set_transcript(&mut self, transcript: Transcript) {
        self.transcript = Some(transcript);
        self.artifacts.clear();
        self.use_cases.clear();
        self.use_case_specs.clear();
        self.touch();
    }

    pub fn store(&mut self, kind: ArtifactKind, record: ArtifactRecord) {
        self.artifacts.insert(kind, record);
        self.touch();
    }

    pub fn set_use_cases(&mut self, use_cases: Vec<UseCase>) {
        self.use_cases = use_cases;
        self.touch();
    }

    pub fn set_use_case_specs(&mut self, specs: Vec<UseCaseSpec>) {
        self.use_case_specs = specs;
        self.touch();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn has(&self, kind: ArtifactKind) -> bool {
        self.artifacts.contains_key(&kind)
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactRecord> {
        self.artifacts.get(&kind)
    }

    pub fn content(&self, kind: ArtifactKind) -> Option<&str> {
        self.artifacts.get(&kind).map(|r| r.content.as_str())
    }

    pub fn satisfies(&self, req: Requirement) -> bool {
        match req {
            Requirement::Transcript => self.transcript.is_some(),
            Requirement::Artifact(k) => self.has(k),
            Requirement::UseCases => !self.use_cases.is_empty(),
        }
    }

    /// Gate requirements of `kind` that this session does not meet yet.
    pub fn missing_prerequisites(&self, kind: ArtifactKind) -> Vec<Requirement> {
        kind.gate()
            .iter()
            .copied()
            .filter(|r| !self.satisfies(*r))
            .collect()
    }

    pub fn is_available(&self, kind: ArtifactKind) -> bool {
        self.missing_prerequisites(kind).is_empty()
    }

    /// Steps whose button should be offered, in pipeline order.
    pub fn available_steps(&self) -> Vec<ArtifactKind> {
        ArtifactKind::all()
            .iter()
            .copied()
            .filter(|k| self.is_available(*k))
            .collect()
    }

    /// An artifact is stale when one of its inputs was regenerated after it.
    pub fn is_stale(&self, kind: ArtifactKind) -> bool {
        let Some(record) = self.artifact(kind) else {
            return false;
        };
        let upstream: &[ArtifactKind] = match kind {
            ArtifactKind::UseCaseSpecs => &[ArtifactKind::UseCaseTable],
            other => other.inputs(),
        };
        upstream
            .iter()
            .filter_map(|k| self.artifact(*k))
            .any(|dep| dep.generated_at > record.generated_at)
    }

    pub fn prompt_inputs(&self) -> PromptInputs<'_> {
        PromptInputs {
            transcript: self.transcript.as_ref().map(|t| t.text.as_str()),
            artifacts: self
                .artifacts
                .iter()
                .map(|(k, r)| (*k, r.content.as_str()))
                .collect(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            transcript: self.transcript.as_ref().map(|t| TranscriptSummary {
                source_name: t.source_name.clone(),
                format: t.format,
                chars: t.text.chars().count(),
                lines: t.line_count(),
            }),
            steps: ArtifactKind::all()
                .iter()
                .map(|&kind| {
                    let record = self.artifact(kind);
                    StepSummary {
                        kind,
                        label: kind.button_label(),
                        heading: kind.heading(),
                        available: self.is_available(kind),
                        missing: self
                            .missing_prerequisites(kind)
                            .iter()
                            .map(|r| r.label().to_string())
                            .collect(),
                        generated_at: record.map(|r| r.generated_at),
                        model: record.map(|r| r.model.clone()),
                        stale: self.is_stale(kind),
                    }
                })
                .collect(),
            use_case_count: self.use_cases.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSummary {
    pub source_name: String,
    pub format: TranscriptFormat,
    pub chars: usize,
    pub lines: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub kind: ArtifactKind,
    pub label: &'static str,
    pub heading: &'static str,
    pub available: bool,
    pub missing: Vec<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub model: Option<String>,
    pub stale: bool,
}

impl StepSummary {
    pub fn generated(&self) -> bool {
        self.generated_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub transcript: Option<TranscriptSummary>,
    pub steps: Vec<StepSummary>,
    pub use_case_count: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
