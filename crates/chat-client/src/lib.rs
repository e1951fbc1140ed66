//! `chat-client`: async driver for OpenAI-compatible chat completion APIs.
//!
//! The `simon` workspace talks to a hosted model through this crate only.
//! Everything above it depends on the [`ChatCompleter`] trait, so tests and
//! alternative backends can stand in for the HTTP client.
//!
//! # Architecture
//!
//! ```text
//! ChatRequest
//!     │
//!     ▼
//! ChatCompleter   ← trait seam (async, object safe)
//!     │
//!     ▼
//! OpenAiClient    ← POST {base_url}/chat/completions, bearer auth
//!     │
//!     ▼
//! Completion      ← first choice text + token usage
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use chat_client::{ChatCompleter, ChatMessage, ChatRequest, ClientConfig, OpenAiClient};
//!
//! let client = OpenAiClient::new(ClientConfig::from_env(
//!     "https://api.openai.com/v1",
//!     "OPENAI_API_KEY",
//!     std::time::Duration::from_secs(120),
//! )?)?;
//!
//! let request = ChatRequest::new("gpt-4o")
//!     .message(ChatMessage::system("Summarize the text."))
//!     .message(ChatMessage::user("..."));
//! let completion = client.complete(request).await?;
//! println!("{}", completion.text);
//! ```

pub mod client;
pub mod error;
pub mod types;


pub use client::{ClientConfig, OpenAiClient};
pub use error::ChatError;
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, Completion, ResponseFormat, Role, TokenUsage,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Anything that can turn a [`ChatRequest`] into a [`Completion`].
///
/// Implementations must be shareable across tasks; the web server keeps one
/// behind an `Arc<dyn ChatCompleter>`.
#[async_trait::async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<Completion>;
}
