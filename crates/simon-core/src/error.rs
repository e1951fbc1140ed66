use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimonError {
    #[error("not initialized: run 'simon init'")]
    NotInitialized,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid session id '{0}': expected a UUID")]
    InvalidSessionId(String),

    #[error("unknown artifact: {0}")]
    UnknownArtifact(String),

    #[error("artifact not generated yet: {0}")]
    ArtifactNotFound(String),

    #[error("session has no transcript: upload one first")]
    TranscriptMissing,

    #[error("transcript is empty")]
    EmptyTranscript,

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("cannot generate {step}: missing {}", missing.join(", "))]
    Blocked { step: String, missing: Vec<String> },

    #[error("no use cases could be read from the use case table")]
    NoUseCases,

    #[error("{step} failed: {source}")]
    Completion {
        step: String,
        #[source]
        source: chat_client::ChatError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimonError>;
