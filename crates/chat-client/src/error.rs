use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("API key not set: export {0}")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse completion response: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model returned no content")]
    EmptyResponse,
}

impl ChatError {
    /// `true` when the failure is on the model provider's side (as opposed to
    /// local configuration).
    pub fn is_upstream(&self) -> bool {
        !matches!(self, ChatError::MissingApiKey(_))
    }
}
