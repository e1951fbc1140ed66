pub mod config;
pub mod error;
pub mod export;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod table;
pub mod transcript;
pub mod types;

pub use error::{Result, SimonError};
