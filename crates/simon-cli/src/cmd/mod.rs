pub mod config;
pub mod export;
pub mod init;
pub mod run;
pub mod session;
pub mod step;
pub mod transcript;
pub mod ui;

use anyhow::Context;
use chat_client::{ClientConfig, OpenAiClient};
use simon_core::config::Config;
use simon_core::pipeline::StepProgress;
use simon_core::transcript::Transcript;
use simon_core::types::ArtifactKind;
use std::path::Path;
use std::time::Duration;

/// Read and extract a transcript file, naming it after the file.
pub(crate) fn read_transcript(path: &Path) -> anyhow::Result<Transcript> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    simon_core::transcript::load(name, &bytes)
        .with_context(|| format!("cannot load transcript {}", path.display()))
}

pub(crate) fn client(config: &Config) -> anyhow::Result<OpenAiClient> {
    let client_config = ClientConfig::from_env(
        &config.llm.base_url,
        &config.llm.api_key_env,
        Duration::from_secs(config.llm.timeout_secs),
    )?;
    Ok(OpenAiClient::new(client_config)?)
}

/// Step progress on stderr, so stdout stays clean for the artifact.
pub(crate) struct StderrProgress {
    pub quiet: bool,
}

impl StepProgress for StderrProgress {
    fn started(&self, kind: ArtifactKind, calls: usize) {
        if self.quiet {
            return;
        }
        if calls > 1 {
            eprintln!("{} ({calls} calls)...", kind.heading());
        } else {
            eprintln!("{}...", kind.heading());
        }
    }

    fn task_progress(&self, _kind: ArtifactKind, current: usize, total: usize, detail: &str) {
        if !self.quiet && total > 1 {
            eprintln!("  [{current}/{total}] {detail}");
        }
    }
}
