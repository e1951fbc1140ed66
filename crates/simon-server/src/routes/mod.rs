pub mod artifacts;
pub mod config;
pub mod events;
pub mod export;
pub mod sessions;
pub mod steps;
pub mod transcript;
